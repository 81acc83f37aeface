//! Load daily panels from a CSV directory and derive forward returns

use data_ingestion::{CsvPanelStore, PanelSet, PanelStore, CLOSE_FIELD};
use tracing::Level;

const CLOSE_CSV: &str = "date,600000.SH,000001.SZ,300750.SZ
2021-03-01,10.50,21.30,402.10
2021-03-02,10.62,21.05,398.00
2021-03-03,10.58,,405.50
2021-03-04,10.71,21.40,410.20
2021-03-05,10.66,21.62,407.80
";

const VOLUME_CSV: &str = "date,600000.SH,000001.SZ,300750.SZ
20210301,1200,3400,800
20210302,1100,3550,760
20210303,1300,0,900
20210304,1250,3300,820
20210305,1180,3610,790
";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let root = std::env::temp_dir().join("panel_store_demo");
    std::fs::create_dir_all(&root)?;
    std::fs::write(root.join("close.csv"), CLOSE_CSV)?;
    std::fs::write(root.join("volume.csv"), VOLUME_CSV)?;

    let store = CsvPanelStore::new(&root);
    println!("Fields in {}: {:?}", root.display(), store.fields()?);

    let panels = PanelSet::load(&store, &[CLOSE_FIELD, "volume"])?;
    println!("{} dates x {} instruments", panels.dates().len(), panels.ids().len());

    let returns = panels.forward_returns()?;
    println!("\nForward returns:");
    for (date, row) in returns.iter_rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|v| v.map(|r| format!("{:>8.4}", r)).unwrap_or_else(|| format!("{:>8}", "-")))
            .collect();
        println!("  {}  {}", date, cells.join(" "));
    }

    Ok(())
}
