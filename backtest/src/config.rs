//! Backtest configuration and per-call overrides

use anyhow::Context;
use chrono::NaiveDate;
use common::{AlphaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::universe::UniverseSelector;

/// Output a backtest can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    Ic,
    Pnl,
    Weight,
    Metrics,
}

/// Set of requested outputs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSet(BTreeSet<Output>);

impl OutputSet {
    pub fn all() -> Self {
        [Output::Ic, Output::Pnl, Output::Weight, Output::Metrics]
            .into_iter()
            .collect()
    }

    pub fn only(output: Output) -> Self {
        std::iter::once(output).collect()
    }

    pub fn contains(&self, output: Output) -> bool {
        self.0.contains(&output)
    }

    pub fn insert(&mut self, output: Output) {
        self.0.insert(output);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Output> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Output> for OutputSet {
    fn from_iter<I: IntoIterator<Item = Output>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Engine defaults, fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// First trading date of the evaluation window (inclusive)
    #[serde(default = "default_start")]
    pub start: NaiveDate,

    /// Last trading date of the evaluation window (inclusive)
    #[serde(default = "default_end")]
    pub end: NaiveDate,

    /// Starting capital of the simulated book
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,

    /// `all` or the name of a registered universe preset
    #[serde(default = "default_universe")]
    pub universe: String,

    /// Outputs emitted when a call does not say otherwise
    #[serde(default = "OutputSet::all")]
    pub outputs: OutputSet,

    /// Days whose absolute factor sum falls below this get zero weights
    #[serde(default = "default_weight_epsilon")]
    pub weight_epsilon: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            initial_capital: default_initial_capital(),
            universe: default_universe(),
            outputs: OutputSet::all(),
            weight_epsilon: default_weight_epsilon(),
        }
    }
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn default_initial_capital() -> f64 {
    1e8
}

fn default_universe() -> String {
    UniverseSelector::ALL.to_string()
}

fn default_weight_epsilon() -> f64 {
    1e-8
}

impl BacktestConfig {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_window(self.start, self.end)?;
        check_capital(self.initial_capital)?;
        if !(self.weight_epsilon > 0.0) {
            return Err(AlphaError::InvalidConfig(format!(
                "weight_epsilon must be positive, got {}",
                self.weight_epsilon
            )));
        }
        Ok(())
    }

    /// Merge per-call overrides over these defaults
    pub fn resolve(&self, overrides: &BacktestOverrides) -> Result<ResolvedParams> {
        let params = ResolvedParams {
            start: overrides.start.unwrap_or(self.start),
            end: overrides.end.unwrap_or(self.end),
            initial_capital: overrides.initial_capital.unwrap_or(self.initial_capital),
            universe: overrides
                .universe
                .clone()
                .unwrap_or_else(|| UniverseSelector::from_name(&self.universe)),
            outputs: overrides.outputs.clone().unwrap_or_else(|| self.outputs.clone()),
            weight_epsilon: self.weight_epsilon,
        };
        check_window(params.start, params.end)?;
        check_capital(params.initial_capital)?;
        Ok(params)
    }
}

fn check_window(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(AlphaError::InvalidConfig(format!(
            "start {} is after end {}",
            start, end
        )));
    }
    Ok(())
}

fn check_capital(capital: f64) -> Result<()> {
    if !(capital > 0.0) || !capital.is_finite() {
        return Err(AlphaError::InvalidConfig(format!(
            "initial capital must be positive, got {}",
            capital
        )));
    }
    Ok(())
}

/// Partial configuration supplied with a single call
#[derive(Debug, Clone, Default)]
pub struct BacktestOverrides {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub initial_capital: Option<f64>,
    pub universe: Option<UniverseSelector>,
    pub outputs: Option<OutputSet>,
}

impl BacktestOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn capital(mut self, capital: f64) -> Self {
        self.initial_capital = Some(capital);
        self
    }

    pub fn universe(mut self, universe: UniverseSelector) -> Self {
        self.universe = Some(universe);
        self
    }

    pub fn outputs(mut self, outputs: OutputSet) -> Self {
        self.outputs = Some(outputs);
        self
    }
}

/// Effective parameters of one evaluation
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_capital: f64,
    pub universe: UniverseSelector,
    pub outputs: OutputSet,
    pub weight_epsilon: f64,
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<BacktestConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backtest config {}", path))?;
    let config: BacktestConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to TOML file
pub fn save_config(config: &BacktestConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Create a default configuration file template
pub fn create_config_template(path: &str) -> anyhow::Result<()> {
    let template = "# Factor Backtest Configuration

# Evaluation window, inclusive trading dates
start = \"2020-01-01\"
end = \"2022-12-31\"

# Starting capital of the simulated book
initial_capital = 100000000.0

# Instrument universe: \"all\" or a registered preset name
universe = \"all\"

# Outputs emitted by default: any of ic, pnl, weight, metrics
outputs = [\"ic\", \"pnl\", \"weight\", \"metrics\"]

# Days with an absolute factor sum below this are left unweighted
weight_epsilon = 1e-8
";

    std::fs::write(path, template)?;
    Ok(())
}
