//! Factor Backtest Engine
//!
//! Evaluates cross-sectional factor panels against forward returns with a
//! dollar-neutral, factor-proportional book and persists the results.

mod artifacts;
mod config;
mod engine;
mod metrics;
mod universe;

pub use artifacts::{ArtifactKey, ArtifactKind, ArtifactStore};
pub use config::{
    create_config_template, load_config, save_config, BacktestConfig, BacktestOverrides, Output,
    OutputSet, ResolvedParams,
};
pub use engine::{
    compute_weights, cumulative_pnl, information_coefficients, portfolio_returns, BacktestEngine,
    BacktestReport, FactorEvaluator,
};
pub use metrics::{DrawdownCalculator, IcSeries, MetricsRecord};
pub use universe::{ResolvedUniverse, UniverseResolver, UniverseSelector};
