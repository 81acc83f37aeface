//! Backtest engine: factor panel in, weights, P&L, IC and metrics out

use chrono::NaiveDate;
use common::{stats, AlphaError, Panel, Result, Series};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{BacktestConfig, BacktestOverrides, Output};
use crate::metrics::{IcSeries, MetricsRecord};
use crate::universe::{ResolvedUniverse, UniverseResolver, UniverseSelector};

/// Outputs of one evaluation; only the requested ones are populated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Universe name used in artifact paths
    pub universe: String,
    /// Whether the factor was negated because its mean IC was negative
    pub flipped: bool,
    pub ic: Option<IcSeries>,
    pub pnl: Option<Series>,
    pub weights: Option<Panel>,
    pub metrics: Option<MetricsRecord>,
}

impl BacktestReport {
    /// Headline fields and metrics as JSON, without the per-date tables
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "start": self.start,
            "end": self.end,
            "universe": self.universe,
            "flipped": self.flipped,
            "metrics": self.metrics,
        })
    }
}

/// Seam between the alpha pool and whatever evaluates factors
pub trait FactorEvaluator {
    /// Run a full evaluation of `factor` under `name`
    fn evaluate(
        &self,
        factor: &Panel,
        name: &str,
        overrides: &BacktestOverrides,
    ) -> Result<BacktestReport>;

    /// Resolve a universe selector against the return panel
    fn resolve_universe(&self, selector: &UniverseSelector) -> Result<ResolvedUniverse>;

    /// Executable form of a factor: lagged one period, restricted to `[start, end]`
    fn align_factor(&self, factor: &Panel, start: NaiveDate, end: NaiveDate) -> Panel {
        factor.shift(1).slice_dates(start, end)
    }
}

/// Dollar-neutral factor backtester over a fixed forward return panel
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    returns: Panel,
    config: BacktestConfig,
    resolver: UniverseResolver,
}

impl BacktestEngine {
    /// Engine over `returns`, the forward one-period return panel
    pub fn new(returns: Panel, config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        let resolver = UniverseResolver::new(&returns);
        Ok(Self {
            returns,
            config,
            resolver,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn returns(&self) -> &Panel {
        &self.returns
    }

    pub fn resolver(&self) -> &UniverseResolver {
        &self.resolver
    }

    /// Register universe presets through this
    pub fn resolver_mut(&mut self) -> &mut UniverseResolver {
        &mut self.resolver
    }

    /// Evaluate a raw factor panel.
    ///
    /// The factor computed with information through date t is traded from
    /// t + 1 on; a negative mean IC flips the factor before weighting.
    pub fn run(
        &self,
        factor: &Panel,
        name: &str,
        overrides: &BacktestOverrides,
    ) -> Result<BacktestReport> {
        let params = self.config.resolve(overrides)?;
        let universe = self.resolver.resolve(&params.universe)?;

        let factor = universe.apply(factor);
        let factor = self.align_factor(&factor, params.start, params.end);
        let returns = self.align_returns(&factor)?;
        debug!(
            factor = name,
            dates = factor.n_dates(),
            instruments = factor.n_columns(),
            universe = %universe.name,
            "Aligned factor with forward returns"
        );

        let ic = information_coefficients(&factor, &returns)?;

        let flipped = ic.ic_mean().map_or(false, |m| m < 0.0);
        let signal = if flipped {
            warn!(factor = name, ic_mean = ?ic.ic_mean(), "Negative mean IC, trading the reversed factor");
            factor.negate()
        } else {
            factor
        };

        let weights = compute_weights(&signal, params.weight_epsilon);
        let portfolio = portfolio_returns(&weights, &returns)?;
        let pnl = cumulative_pnl(&portfolio, params.initial_capital)?;

        let metrics = if params.outputs.contains(Output::Metrics) {
            let metrics = MetricsRecord::compute(name, &ic, &pnl);
            info!(
                factor = name,
                ic_mean = ?metrics.ic_mean,
                rank_ic_mean = ?metrics.rank_ic_mean,
                sharpe = ?metrics.sharpe_ratio,
                max_drawdown = ?metrics.max_drawdown,
                "Backtest complete"
            );
            Some(metrics)
        } else {
            info!(factor = name, final_capital = ?pnl.last(), "Backtest complete");
            None
        };

        Ok(BacktestReport {
            name: name.to_string(),
            start: params.start,
            end: params.end,
            universe: universe.name,
            flipped,
            ic: params.outputs.contains(Output::Ic).then_some(ic),
            pnl: params.outputs.contains(Output::Pnl).then_some(pnl),
            weights: params.outputs.contains(Output::Weight).then_some(weights),
            metrics,
        })
    }

    /// Forward returns on the factor's dates and instruments.
    ///
    /// Instruments unknown to the return panel get missing returns; a date
    /// unknown to it is an alignment error.
    fn align_returns(&self, factor: &Panel) -> Result<Panel> {
        let positions: Vec<Option<usize>> = factor
            .columns()
            .iter()
            .map(|c| self.returns.column_position(c))
            .collect();

        let mut values = Vec::with_capacity(factor.n_dates());
        for date in factor.dates() {
            let row = self
                .returns
                .row_for(*date)
                .ok_or(AlphaError::Alignment { date: *date })?;
            values.push(positions.iter().map(|p| p.and_then(|j| row[j])).collect());
        }

        Panel::new(factor.dates().to_vec(), factor.columns().to_vec(), values)
    }
}

impl FactorEvaluator for BacktestEngine {
    fn evaluate(
        &self,
        factor: &Panel,
        name: &str,
        overrides: &BacktestOverrides,
    ) -> Result<BacktestReport> {
        self.run(factor, name, overrides)
    }

    fn resolve_universe(&self, selector: &UniverseSelector) -> Result<ResolvedUniverse> {
        self.resolver.resolve(selector)
    }
}

/// Per-date linear and rank correlation between factor and forward returns
pub fn information_coefficients(factor: &Panel, returns: &Panel) -> Result<IcSeries> {
    if !factor.same_dates(returns) {
        return Err(AlphaError::IndexMismatch(
            "factor and returns should have the same index".to_string(),
        ));
    }

    let (ic, rank_ic): (Vec<_>, Vec<_>) = factor
        .values()
        .iter()
        .zip(returns.values().iter())
        .map(|(f, r)| (stats::pearson_pairwise(f, r), stats::spearman_pairwise(f, r)))
        .unzip();

    Ok(IcSeries {
        ic: Series::new(factor.dates().to_vec(), ic)?,
        rank_ic: Series::new(factor.dates().to_vec(), rank_ic)?,
    })
}

/// Scale each date so absolute weights sum to one.
///
/// A date whose absolute factor sum is below `epsilon` gets all-zero weights.
pub fn compute_weights(factor: &Panel, epsilon: f64) -> Panel {
    factor.map_rows(|row| {
        let gross: f64 = row.iter().flatten().map(|v| v.abs()).sum();
        if gross < epsilon {
            vec![Some(0.0); row.len()]
        } else {
            row.iter().map(|v| v.map(|x| x / gross)).collect()
        }
    })
}

/// Weighted forward return per date, realized one period later.
///
/// The first date has no realized return yet and books zero.
pub fn portfolio_returns(weights: &Panel, returns: &Panel) -> Result<Series> {
    if !weights.same_dates(returns) {
        return Err(AlphaError::IndexMismatch(
            "weights and returns should have the same index".to_string(),
        ));
    }

    let gross = weights
        .values()
        .iter()
        .zip(returns.values().iter())
        .map(|(w, r)| {
            let (w, r) = stats::paired(w, r);
            Some(w.iter().zip(r.iter()).map(|(w, r)| w * r).sum::<f64>())
        })
        .collect();

    Ok(Series::new(weights.dates().to_vec(), gross)?
        .shift(1)
        .fill_missing(0.0))
}

/// Capital path with additive compounding: `capital * (1 + cumsum(returns))`
pub fn cumulative_pnl(returns: &Series, capital: f64) -> Result<Series> {
    let mut total = 0.0;
    let values = returns
        .values()
        .iter()
        .map(|r| {
            total += r.unwrap_or(0.0);
            Some(capital * (1.0 + total))
        })
        .collect();
    Series::new(returns.dates().to_vec(), values)
}
