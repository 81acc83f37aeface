//! Universe resolution shared by the backtest engine and the alpha pool

use chrono::NaiveDate;
use common::{AlphaError, Panel, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Which instruments are eligible on each date
#[derive(Debug, Clone, PartialEq)]
pub enum UniverseSelector {
    /// No filtering
    All,
    /// Named preset registered with the resolver
    Preset(String),
    /// Caller-supplied 0/1 panel
    Mask { name: String, mask: Panel },
}

impl UniverseSelector {
    pub const ALL: &'static str = "all";

    /// `all` maps to [`UniverseSelector::All`], anything else to a preset
    pub fn from_name(name: &str) -> Self {
        if name == Self::ALL {
            UniverseSelector::All
        } else {
            UniverseSelector::Preset(name.to_string())
        }
    }

    pub fn mask(name: &str, mask: Panel) -> Self {
        UniverseSelector::Mask {
            name: name.to_string(),
            mask,
        }
    }
}

/// Concrete universe: the name used in artifact paths plus an optional mask
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUniverse {
    pub name: String,
    pub mask: Option<Panel>,
}

impl ResolvedUniverse {
    pub fn all() -> Self {
        Self {
            name: UniverseSelector::ALL.to_string(),
            mask: None,
        }
    }

    pub fn is_all(&self) -> bool {
        self.mask.is_none()
    }

    /// Selector that resolves back to this universe
    pub fn selector(&self) -> UniverseSelector {
        match &self.mask {
            Some(mask) => UniverseSelector::mask(&self.name, mask.clone()),
            None => UniverseSelector::All,
        }
    }

    /// Mark factor entries outside the universe as missing
    pub fn apply(&self, factor: &Panel) -> Panel {
        match &self.mask {
            Some(mask) => factor.mask_with(mask),
            None => factor.clone(),
        }
    }
}

/// Resolves selectors against the return panel's index
#[derive(Debug, Clone)]
pub struct UniverseResolver {
    dates: HashSet<NaiveDate>,
    columns: HashSet<String>,
    presets: BTreeMap<String, Panel>,
}

impl UniverseResolver {
    /// Resolver validating masks against `returns`
    pub fn new(returns: &Panel) -> Self {
        Self {
            dates: returns.dates().iter().copied().collect(),
            columns: returns.columns().iter().cloned().collect(),
            presets: BTreeMap::new(),
        }
    }

    /// Register a named preset mask
    pub fn register_preset(&mut self, name: &str, mask: Panel) -> Result<()> {
        if name == UniverseSelector::ALL {
            return Err(AlphaError::InvalidUniverse(format!(
                "'{}' is reserved for the unfiltered universe",
                name
            )));
        }
        self.validate_mask(name, &mask)?;
        info!(universe = name, dates = mask.n_dates(), "Registered universe preset");
        self.presets.insert(name.to_string(), mask);
        Ok(())
    }

    /// Register every `{dir}/{name}.csv` as a preset; returns how many were loaded
    pub fn load_presets_from_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let mask = data_ingestion::read_panel(&path)?;
            self.register_preset(name, mask)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn presets(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(|k| k.as_str())
    }

    /// Turn a selector into a concrete universe.
    ///
    /// Unknown presets fall back to the unfiltered universe with a warning;
    /// malformed masks are rejected.
    pub fn resolve(&self, selector: &UniverseSelector) -> Result<ResolvedUniverse> {
        match selector {
            UniverseSelector::All => Ok(ResolvedUniverse::all()),
            UniverseSelector::Preset(name) if name == UniverseSelector::ALL => {
                Ok(ResolvedUniverse::all())
            }
            UniverseSelector::Preset(name) => match self.presets.get(name) {
                Some(mask) => Ok(ResolvedUniverse {
                    name: name.clone(),
                    mask: Some(mask.clone()),
                }),
                None => {
                    warn!(universe = %name, "Unsupported universe, setting universe to 'all'");
                    Ok(ResolvedUniverse::all())
                }
            },
            UniverseSelector::Mask { name, mask } => {
                if name.is_empty() || name == UniverseSelector::ALL {
                    return Err(AlphaError::InvalidUniverse(format!(
                        "a universe mask needs its own name, got '{}'",
                        name
                    )));
                }
                self.validate_mask(name, mask)?;
                Ok(ResolvedUniverse {
                    name: name.clone(),
                    mask: Some(mask.clone()),
                })
            }
        }
    }

    fn validate_mask(&self, name: &str, mask: &Panel) -> Result<()> {
        if let Some(date) = mask.dates().iter().find(|d| !self.dates.contains(*d)) {
            return Err(AlphaError::InvalidUniverse(format!(
                "universe '{}' has invalid date {}",
                name, date
            )));
        }
        if let Some(column) = mask.columns().iter().find(|c| !self.columns.contains(*c)) {
            return Err(AlphaError::InvalidUniverse(format!(
                "universe '{}' has invalid stock name {}",
                name, column
            )));
        }
        let malformed = mask
            .values()
            .iter()
            .flatten()
            .flatten()
            .find(|v| **v != 0.0 && **v != 1.0);
        if let Some(v) = malformed {
            return Err(AlphaError::InvalidUniverse(format!(
                "universe '{}' must hold 0/1 flags, found {}",
                name, v
            )));
        }
        Ok(())
    }
}
