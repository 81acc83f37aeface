//! Build a small alpha pool and compare a candidate against it

use alpha_pool::{AlphaPool, PoolConfig};
use backtest::{BacktestConfig, BacktestEngine};
use chrono::{Duration, NaiveDate};
use common::Panel;
use data_ingestion::{forward_returns, realized_returns};
use tracing::Level;

fn panel(dates: &[NaiveDate], ids: &[String], f: impl Fn(f64, f64) -> f64) -> anyhow::Result<Panel> {
    let rows = (0..dates.len())
        .map(|i| (0..ids.len()).map(|j| f(i as f64, j as f64)).collect())
        .collect();
    Ok(Panel::from_rows(dates.to_vec(), ids.to_vec(), rows)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let start = NaiveDate::from_ymd_opt(2021, 1, 1).ok_or_else(|| anyhow::anyhow!("bad date"))?;
    let dates: Vec<NaiveDate> = (0..90).map(|i| start + Duration::days(i)).collect();
    let ids: Vec<String> = (1..=10).map(|i| format!("{:06}.SH", 600000 + i)).collect();

    let close = panel(&dates, &ids, |t, k| 20.0 + k + (0.5 * t + k).sin() + 0.01 * t)?;
    let returns = forward_returns(&realized_returns(&close));

    let engine = BacktestEngine::new(returns, BacktestConfig::new(dates[1], dates[88]))?;
    let root = std::env::temp_dir().join("alpha_pool_demo");
    let config = PoolConfig::new(&root, dates[1], dates[88]);
    let mut pool = AlphaPool::new(engine, config)?;

    let loaded = pool.load_existing()?;
    println!("Loaded {} factors from {}", loaded, root.display());

    let reversal = close.pct_change().negate();
    let level = panel(&dates, &ids, |t, k| (0.5 * t + k).cos())?;
    let size = panel(&dates, &ids, |_, k| k)?;

    pool.add(&reversal, "reversal_1d")?;
    pool.add(&level, "cycle_phase")?;
    pool.add(&size, "size")?;
    println!("Pool: {:?}", pool.names().collect::<Vec<_>>());

    let candidate = panel(&dates, &ids, |t, k| (0.5 * t + k + 0.3).cos())?;
    let table = pool.evaluate_candidate(&candidate, "cycle_lead", Some("similarity"))?;

    println!("\n{}", table);
    println!("{}", table.to_json()?);

    Ok(())
}
