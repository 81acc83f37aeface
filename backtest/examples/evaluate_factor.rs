//! Evaluate a one-day reversal factor on a synthetic price panel

use backtest::{ArtifactStore, BacktestConfig, BacktestEngine, BacktestOverrides};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use common::Panel;
use data_ingestion::{InMemoryPanelStore, PanelSet, CLOSE_FIELD};
use signal_generation::{clip_outliers, zscore};
use tracing::Level;

fn trading_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(n);
    let mut day = start;
    while days.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

fn synthetic_close(dates: Vec<NaiveDate>, ids: Vec<String>) -> anyhow::Result<Panel> {
    let rows = (0..dates.len())
        .map(|i| {
            (0..ids.len())
                .map(|j| {
                    let t = i as f64;
                    let k = j as f64;
                    10.0 + k + 0.4 * (0.7 * t + 1.3 * k).sin() + 0.002 * t * k
                })
                .collect()
        })
        .collect();
    Ok(Panel::from_rows(dates, ids, rows)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let start = NaiveDate::from_ymd_opt(2021, 1, 4).ok_or_else(|| anyhow::anyhow!("bad date"))?;
    let dates = trading_days(start, 120);
    let ids: Vec<String> = (1..=12).map(|i| format!("{:06}.SZ", i)).collect();

    let store = InMemoryPanelStore::new().with_field(CLOSE_FIELD, synthetic_close(dates.clone(), ids)?);
    let panels = PanelSet::load(&store, &[CLOSE_FIELD])?;
    let returns = panels.forward_returns()?;

    let close = panels
        .get(CLOSE_FIELD)
        .ok_or_else(|| anyhow::anyhow!("close not loaded"))?;
    let reversal = zscore(&clip_outliers(&close.pct_change().negate()));

    let config = BacktestConfig::new(dates[5], dates[dates.len() - 2]);
    let engine = BacktestEngine::new(returns, config)?;
    let report = engine.run(&reversal, "reversal_1d", &BacktestOverrides::new().capital(1e6))?;

    println!("=== Backtest: {} ===", report.name);
    println!("  Window: {} to {} ({})", report.start, report.end, report.universe);
    println!("  Factor reversed: {}", report.flipped);
    if let Some(metrics) = &report.metrics {
        for column in backtest::MetricsRecord::columns() {
            match metrics.get(column) {
                Some(v) => println!("  {:<22} {:>10.4}", column, v),
                None => println!("  {:<22} {:>10}", column, "-"),
            }
        }
    }
    if let Some(pnl) = report.pnl.as_ref().and_then(|p| p.last()) {
        println!("  Final capital: {:.2}", pnl);
    }

    let root = std::env::temp_dir().join("alpha_backtest_demo");
    let written = ArtifactStore::new(&root).write_report(&report)?;
    println!("\nWrote {} artifacts under {}", written.len(), root.display());

    Ok(())
}
