//! Factor evaluation metrics

use common::{stats, AlphaError, Result, Series, TRADING_DAYS_PER_YEAR};
use serde::{Deserialize, Serialize};

/// Per-date information coefficients of a factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcSeries {
    /// Pearson correlation between factor and forward return
    pub ic: Series,
    /// Spearman correlation between factor and forward return
    pub rank_ic: Series,
}

impl IcSeries {
    pub fn ic_mean(&self) -> Option<f64> {
        stats::mean(&self.ic.defined())
    }

    pub fn ic_ir(&self) -> Option<f64> {
        stats::information_ratio(&self.ic.defined())
    }

    pub fn rank_ic_mean(&self) -> Option<f64> {
        stats::mean(&self.rank_ic.defined())
    }

    pub fn rank_ic_ir(&self) -> Option<f64> {
        stats::information_ratio(&self.rank_ic.defined())
    }
}

/// Fixed-schema summary of one factor evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Factor name
    pub name: String,

    pub ic_mean: Option<f64>,
    pub ic_ir: Option<f64>,
    pub rank_ic_mean: Option<f64>,
    pub rank_ic_ir: Option<f64>,

    /// Mean daily P&L return times 252
    pub annualized_return: Option<f64>,

    /// Daily P&L return volatility times sqrt(252)
    pub annualized_volatility: Option<f64>,

    pub sharpe_ratio: Option<f64>,

    /// Largest peak-to-trough gap relative to starting capital
    pub max_drawdown: Option<f64>,

    /// Fraction of days with a strictly positive P&L return
    pub win_rate: Option<f64>,
}

impl MetricsRecord {
    /// Column names in table order
    pub const COLUMNS: [&'static str; 9] = [
        "ic_mean",
        "ic_ir",
        "rank_ic_mean",
        "rank_ic_ir",
        "annualized_return",
        "annualized_volatility",
        "sharpe_ratio",
        "max_drawdown",
        "win_rate",
    ];

    pub fn columns() -> &'static [&'static str] {
        &Self::COLUMNS
    }

    pub fn has_column(column: &str) -> bool {
        Self::COLUMNS.contains(&column)
    }

    /// Summarize an IC series and a P&L path
    pub fn compute(name: &str, ic: &IcSeries, pnl: &Series) -> Self {
        let daily = pnl.pct_change().defined();
        let performance = ReturnStats::from_daily(&daily);

        Self {
            name: name.to_string(),
            ic_mean: ic.ic_mean(),
            ic_ir: ic.ic_ir(),
            rank_ic_mean: ic.rank_ic_mean(),
            rank_ic_ir: ic.rank_ic_ir(),
            annualized_return: performance.annualized_return,
            annualized_volatility: performance.annualized_volatility,
            sharpe_ratio: performance.sharpe_ratio(),
            max_drawdown: DrawdownCalculator::scan(pnl),
            win_rate: performance.win_rate,
        }
    }

    /// Value of a metric column, `None` when undefined or unknown
    pub fn get(&self, column: &str) -> Option<f64> {
        match column {
            "ic_mean" => self.ic_mean,
            "ic_ir" => self.ic_ir,
            "rank_ic_mean" => self.rank_ic_mean,
            "rank_ic_ir" => self.rank_ic_ir,
            "annualized_return" => self.annualized_return,
            "annualized_volatility" => self.annualized_volatility,
            "sharpe_ratio" => self.sharpe_ratio,
            "max_drawdown" => self.max_drawdown,
            "win_rate" => self.win_rate,
            _ => None,
        }
    }

    /// Rebuild a record from `(column, value)` rows
    pub fn from_rows<'a, I>(name: &str, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Option<f64>)>,
    {
        let mut record = Self::empty(name);
        let mut seen = 0;
        for (column, value) in rows {
            let slot = match column {
                "ic_mean" => &mut record.ic_mean,
                "ic_ir" => &mut record.ic_ir,
                "rank_ic_mean" => &mut record.rank_ic_mean,
                "rank_ic_ir" => &mut record.rank_ic_ir,
                "annualized_return" => &mut record.annualized_return,
                "annualized_volatility" => &mut record.annualized_volatility,
                "sharpe_ratio" => &mut record.sharpe_ratio,
                "max_drawdown" => &mut record.max_drawdown,
                "win_rate" => &mut record.win_rate,
                other => {
                    return Err(AlphaError::Parse(format!("unknown metric '{}'", other)));
                }
            };
            *slot = value.and_then(stats::finite);
            seen += 1;
        }
        if seen != Self::COLUMNS.len() {
            return Err(AlphaError::Parse(format!(
                "metrics for '{}' have {} of {} rows",
                name,
                seen,
                Self::COLUMNS.len()
            )));
        }
        Ok(record)
    }

    /// Record with every metric undefined
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ic_mean: None,
            ic_ir: None,
            rank_ic_mean: None,
            rank_ic_ir: None,
            annualized_return: None,
            annualized_volatility: None,
            sharpe_ratio: None,
            max_drawdown: None,
            win_rate: None,
        }
    }
}

/// Annualized statistics of a daily return series
#[derive(Debug, Clone, Copy, Default)]
struct ReturnStats {
    annualized_return: Option<f64>,
    annualized_volatility: Option<f64>,
    win_rate: Option<f64>,
}

impl ReturnStats {
    fn from_daily(daily: &[f64]) -> Self {
        let win_rate = if daily.is_empty() {
            None
        } else {
            Some(daily.iter().filter(|r| **r > 0.0).count() as f64 / daily.len() as f64)
        };

        Self {
            annualized_return: stats::mean(daily).map(|m| m * TRADING_DAYS_PER_YEAR),
            annualized_volatility: stats::std_dev(daily)
                .map(|sd| sd * TRADING_DAYS_PER_YEAR.sqrt()),
            win_rate,
        }
    }

    fn sharpe_ratio(&self) -> Option<f64> {
        let ret = self.annualized_return?;
        let vol = self.annualized_volatility?;
        if vol == 0.0 {
            return None;
        }
        stats::finite(ret / vol)
    }
}

/// Forward scan of a capital path tracking its running peak
#[derive(Debug, Clone, Default)]
pub struct DrawdownCalculator {
    base: Option<f64>,
    peak: f64,
    max_gap: f64,
    current_value: f64,
}

impl DrawdownCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with the next capital value
    pub fn update(&mut self, value: f64) {
        if self.base.is_none() {
            self.base = Some(value);
            self.peak = value;
        }
        self.current_value = value;

        if value > self.peak {
            self.peak = value;
        }

        let gap = self.peak - value;
        if gap > self.max_gap {
            self.max_gap = gap;
        }
    }

    /// Largest peak-to-trough gap as a fraction of the first value
    pub fn max_drawdown(&self) -> Option<f64> {
        let base = self.base?;
        if base == 0.0 {
            return None;
        }
        stats::finite(self.max_gap / base)
    }

    /// Current gap below the running peak, as a fraction of the first value
    pub fn current_drawdown(&self) -> Option<f64> {
        let base = self.base?;
        if base == 0.0 {
            return None;
        }
        stats::finite((self.peak - self.current_value) / base)
    }

    /// Maximum drawdown of a whole series, skipping undefined entries
    pub fn scan(pnl: &Series) -> Option<f64> {
        let mut calc = Self::new();
        for value in pnl.values().iter().flatten() {
            calc.update(*value);
        }
        calc.max_drawdown()
    }
}
