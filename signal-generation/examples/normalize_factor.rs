//! Winsorize and standardize a raw factor, then measure how it relates to another

use common::{NaiveDate, Panel};
use signal_generation::{clip_outliers, cross_sectional_correlation, rolling_correlation, zscore};
use tracing::Level;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let dates: Vec<NaiveDate> = (1..=6)
        .filter_map(|day| NaiveDate::from_ymd_opt(2022, 6, day))
        .collect();
    let ids: Vec<String> = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();

    let turnover = Panel::from_rows(
        dates.clone(),
        ids.clone(),
        vec![
            vec![0.8, 1.2, 0.9, 45.0, 1.1],
            vec![0.7, 1.4, f64::NAN, 1.0, 1.3],
            vec![0.9, 1.1, 1.0, 1.2, 0.8],
            vec![1.0, 1.0, 1.0, 1.0, 1.0],
            vec![0.6, 1.5, 1.1, 0.9, 1.2],
            vec![0.8, 1.3, 1.0, 1.1, 0.7],
        ],
    )?;
    let size = Panel::from_rows(
        dates,
        ids,
        vec![
            vec![3.0, 1.0, 2.0, 5.0, 4.0],
            vec![3.1, 1.2, 2.2, 4.8, 4.1],
            vec![2.9, 1.1, 2.1, 5.1, 3.9],
            vec![3.0, 1.0, 2.0, 5.0, 4.0],
            vec![3.2, 0.9, 2.3, 4.9, 4.2],
            vec![3.0, 1.1, 2.0, 5.2, 4.0],
        ],
    )?;

    let normalized = zscore(&clip_outliers(&turnover));
    println!("Normalized turnover:");
    for (date, row) in normalized.iter_rows() {
        println!("  {} {:?}", date, row);
    }

    match cross_sectional_correlation(&normalized, &size)? {
        Some(corr) => println!("\nMean cross-sectional correlation with size: {:.4}", corr),
        None => println!("\nCorrelation with size undefined on every date"),
    }

    let rolling = rolling_correlation(&turnover, &size, 3)?;
    println!("Trailing 3-day correlation, last row: {:?}", rolling.row(rolling.n_dates() - 1));

    Ok(())
}
