//! Alpha pool: previously evaluated factors for one window and universe

use backtest::{
    ArtifactKey, ArtifactKind, ArtifactStore, BacktestOverrides, FactorEvaluator, MetricsRecord,
    Output, OutputSet, ResolvedUniverse, UniverseSelector,
};
use common::{AlphaError, Panel, Result};
use signal_generation::cross_sectional_correlation;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::report::{ComparisonRow, ComparisonTable};

/// A pooled factor
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    /// Factor in executable form: lagged one period and restricted to the pool window
    pub factor: Panel,
    pub metrics: MetricsRecord,
    /// Directory holding the factor's artifacts
    pub path: PathBuf,
}

/// Collection of evaluated factors, keyed by name
pub struct AlphaPool<E: FactorEvaluator> {
    evaluator: E,
    config: PoolConfig,
    universe: ResolvedUniverse,
    store: ArtifactStore,
    entries: BTreeMap<String, PoolEntry>,
}

impl<E: FactorEvaluator> AlphaPool<E> {
    /// Pool over the universe named in `config`
    pub fn new(evaluator: E, config: PoolConfig) -> Result<Self> {
        let selector = UniverseSelector::from_name(&config.universe);
        Self::with_universe(evaluator, config, selector)
    }

    /// Pool over an explicit universe selector, e.g. a caller-supplied mask
    pub fn with_universe(evaluator: E, config: PoolConfig, selector: UniverseSelector) -> Result<Self> {
        config.validate()?;
        let universe = evaluator.resolve_universe(&selector)?;
        let store = ArtifactStore::new(config.root.clone());

        info!(
            root = %config.root.display(),
            start = %config.start,
            end = %config.end,
            universe = %universe.name,
            "Alpha pool ready"
        );

        Ok(Self {
            evaluator,
            config,
            universe,
            store,
            entries: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Name of the resolved universe, as used in artifact paths
    pub fn universe(&self) -> &str {
        &self.universe.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&PoolEntry> {
        self.entries.get(name)
    }

    /// Drop an entry from memory; its artifacts stay on disk
    pub fn remove(&mut self, name: &str) -> Option<PoolEntry> {
        self.entries.remove(name)
    }

    /// Evaluate and store a factor, overwriting any entry of the same name.
    ///
    /// Evaluation is skipped when a metrics artifact already exists for this
    /// name, window and universe.
    pub fn add(&mut self, factor: &Panel, name: &str) -> Result<&PoolEntry> {
        let key = self.key(name);

        let metrics = if self.store.exists(&key, ArtifactKind::Metrics) {
            debug!(factor = name, "Metrics already cached, skipping evaluation");
            self.store.read_metrics(&key)?
        } else {
            let metrics = self.compute_metrics(factor, name)?;
            self.store.write_metrics(&key, &metrics)?;
            metrics
        };

        let aligned = self
            .evaluator
            .align_factor(factor, self.config.start, self.config.end);
        self.store.write_factor(&key, &aligned)?;

        info!(factor = name, ic_mean = ?metrics.ic_mean, sharpe = ?metrics.sharpe_ratio, "Added factor to pool");

        let entry = PoolEntry {
            factor: aligned,
            metrics,
            path: self.store.factor_dir(name),
        };
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                Ok(slot.into_mut())
            }
            Entry::Vacant(slot) => Ok(slot.insert(entry)),
        }
    }

    /// Rebuild entries from artifacts persisted under the pool root.
    ///
    /// Only factors with an `alpha` artifact for this window and universe are
    /// picked up; names already in memory are left alone. Returns how many
    /// entries were loaded.
    pub fn load_existing(&mut self) -> Result<usize> {
        let mut loaded = 0;
        for name in self.store.factor_names()? {
            if self.entries.contains_key(&name) {
                debug!(factor = %name, "Already in pool, not reloading");
                continue;
            }
            let key = self.key(&name);
            if !self.store.exists(&key, ArtifactKind::Alpha) {
                continue;
            }

            let metrics = self.store.read_metrics(&key)?;
            let factor = self.store.read_factor(&key)?;
            self.entries.insert(
                name.clone(),
                PoolEntry {
                    factor,
                    metrics,
                    path: self.store.factor_dir(&name),
                },
            );
            loaded += 1;
        }

        info!(loaded, total = self.entries.len(), "Loaded pooled factors from disk");
        Ok(loaded)
    }

    /// Compare a candidate against every pooled factor.
    ///
    /// The candidate is not stored. Its row comes first with similarity 1.0,
    /// followed by the pooled factors in name order, each tagged with the mean
    /// cross-sectional correlation between its factor and the candidate.
    pub fn evaluate_candidate(
        &self,
        factor: &Panel,
        name: &str,
        sort_by: Option<&str>,
    ) -> Result<ComparisonTable> {
        if let Some(column) = sort_by {
            ComparisonTable::check_column(column)?;
        }

        let key = self.key(name);
        let metrics = if self.store.exists(&key, ArtifactKind::Metrics) {
            self.store.read_metrics(&key)?
        } else {
            self.compute_metrics(factor, name)?
        };

        let aligned = self
            .evaluator
            .align_factor(factor, self.config.start, self.config.end);

        let mut rows = Vec::with_capacity(self.entries.len() + 1);
        rows.push(ComparisonRow {
            metrics,
            similarity: Some(1.0),
        });
        for (pooled, entry) in &self.entries {
            let similarity = cross_sectional_correlation(&aligned, &entry.factor)?;
            debug!(candidate = name, pooled = %pooled, similarity = ?similarity, "Compared factors");
            rows.push(ComparisonRow {
                metrics: entry.metrics.clone(),
                similarity,
            });
        }

        let mut table = ComparisonTable::new(name, rows);
        if let Some(column) = sort_by {
            table.sort_by(column)?;
        }

        info!(candidate = name, pooled = self.entries.len(), "Candidate comparison\n{}", table);
        Ok(table)
    }

    fn key(&self, name: &str) -> ArtifactKey {
        ArtifactKey::new(name, self.config.start, self.config.end, &self.universe.name)
    }

    fn compute_metrics(&self, factor: &Panel, name: &str) -> Result<MetricsRecord> {
        let overrides = BacktestOverrides::new()
            .window(self.config.start, self.config.end)
            .universe(self.universe.selector())
            .outputs(OutputSet::only(Output::Metrics));

        let report = self.evaluator.evaluate(factor, name, &overrides)?;
        report.metrics.ok_or_else(|| {
            warn!(factor = name, "Evaluator returned no metrics");
            AlphaError::MissingMetrics(name.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest::{BacktestConfig, BacktestEngine, BacktestReport};
    use common::NaiveDate;
    use std::cell::Cell;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 9, day).unwrap()
    }

    fn dates() -> Vec<NaiveDate> {
        (1..=10).map(d).collect()
    }

    fn cols() -> Vec<String> {
        ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect()
    }

    fn factor(seed: usize) -> Panel {
        let rows = (0..10)
            .map(|i| {
                (0..4)
                    .map(|j| ((i * seed + j * 5 + seed) % 7) as f64 - 3.0)
                    .collect()
            })
            .collect();
        Panel::from_rows(dates(), cols(), rows).unwrap()
    }

    fn returns() -> Panel {
        let rows = (0..10)
            .map(|i| (0..4).map(|j| (((i + 2 * j) % 5) as f64 - 2.0) * 0.01).collect())
            .collect();
        Panel::from_rows(dates(), cols(), rows).unwrap()
    }

    /// Evaluator that counts calls and reports a fixed IC
    struct CountingEvaluator {
        calls: Cell<usize>,
        with_metrics: bool,
    }

    impl CountingEvaluator {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                with_metrics: true,
            }
        }

        fn without_metrics() -> Self {
            Self {
                calls: Cell::new(0),
                with_metrics: false,
            }
        }
    }

    impl FactorEvaluator for CountingEvaluator {
        fn evaluate(
            &self,
            _factor: &Panel,
            name: &str,
            overrides: &BacktestOverrides,
        ) -> Result<BacktestReport> {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(overrides.outputs, Some(OutputSet::only(Output::Metrics)));
            Ok(BacktestReport {
                name: name.to_string(),
                start: overrides.start.unwrap_or(d(1)),
                end: overrides.end.unwrap_or(d(10)),
                universe: "all".to_string(),
                flipped: false,
                ic: None,
                pnl: None,
                weights: None,
                metrics: self.with_metrics.then(|| MetricsRecord {
                    ic_mean: Some(0.04),
                    ..MetricsRecord::empty(name)
                }),
            })
        }

        fn resolve_universe(&self, _selector: &UniverseSelector) -> Result<ResolvedUniverse> {
            Ok(ResolvedUniverse::all())
        }
    }

    fn config(root: &std::path::Path) -> PoolConfig {
        PoolConfig::new(root, d(1), d(10))
    }

    #[test]
    fn test_re_adding_cached_factor_skips_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = AlphaPool::new(CountingEvaluator::new(), config(dir.path())).unwrap();

        pool.add(&factor(1), "alpha_001").unwrap();
        pool.add(&factor(1), "alpha_001").unwrap();
        assert_eq!(pool.evaluator().calls.get(), 1);
        assert_eq!(pool.len(), 1);

        let entry = pool.get("alpha_001").unwrap();
        assert_eq!(entry.metrics.ic_mean, Some(0.04));
        assert_eq!(entry.path, dir.path().join("alpha_001"));
        assert!(dir
            .path()
            .join("alpha_001/alpha_001_20210901_20210910_all_metrics.csv")
            .is_file());
        assert!(dir
            .path()
            .join("alpha_001/alpha_001_20210901_20210910_all_alpha.csv")
            .is_file());
    }

    #[test]
    fn test_evaluation_without_metrics_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = AlphaPool::new(CountingEvaluator::without_metrics(), config(dir.path())).unwrap();

        let result = pool.add(&factor(1), "alpha_001");
        assert!(matches!(result, Err(AlphaError::MissingMetrics(name)) if name == "alpha_001"));
        assert!(pool.is_empty());
        assert!(!dir
            .path()
            .join("alpha_001/alpha_001_20210901_20210910_all_metrics.csv")
            .exists());

        // nothing was cached, so the next attempt evaluates again
        assert!(pool.add(&factor(1), "alpha_001").is_err());
        assert_eq!(pool.evaluator().calls.get(), 2);
    }

    #[test]
    fn test_stored_factor_is_lagged_and_windowed() {
        let dir = tempfile::tempdir().unwrap();
        let config = PoolConfig::new(dir.path(), d(3), d(6));
        let mut pool = AlphaPool::new(CountingEvaluator::new(), config).unwrap();

        let raw = factor(2);
        let entry = pool.add(&raw, "alpha_002").unwrap();
        assert_eq!(entry.factor.dates(), &[d(3), d(4), d(5), d(6)]);
        assert_eq!(entry.factor.row(0), raw.row(1));
    }

    #[test]
    fn test_load_existing_restores_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut pool = AlphaPool::new(CountingEvaluator::new(), config(dir.path())).unwrap();
            pool.add(&factor(1), "alpha_001").unwrap();
            pool.add(&factor(3), "alpha_003").unwrap();
        }

        let mut pool = AlphaPool::new(CountingEvaluator::new(), config(dir.path())).unwrap();
        assert_eq!(pool.load_existing().unwrap(), 2);
        assert_eq!(pool.names().collect::<Vec<_>>(), vec!["alpha_001", "alpha_003"]);
        assert_eq!(pool.evaluator().calls.get(), 0);

        // names already in memory are skipped
        assert_eq!(pool.load_existing().unwrap(), 0);

        // other windows are invisible
        let other = PoolConfig::new(dir.path(), d(2), d(10));
        let mut pool = AlphaPool::new(CountingEvaluator::new(), other).unwrap();
        assert_eq!(pool.load_existing().unwrap(), 0);
    }

    #[test]
    fn test_load_existing_detects_partial_write() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut pool = AlphaPool::new(CountingEvaluator::new(), config(dir.path())).unwrap();
            pool.add(&factor(1), "alpha_001").unwrap();
        }
        std::fs::remove_file(
            dir.path()
                .join("alpha_001/alpha_001_20210901_20210910_all_metrics.csv"),
        )
        .unwrap();

        let mut pool = AlphaPool::new(CountingEvaluator::new(), config(dir.path())).unwrap();
        match pool.load_existing() {
            Err(AlphaError::MissingArtifact { path }) => {
                assert!(path.ends_with("alpha_001_20210901_20210910_all_metrics.csv"));
            }
            other => panic!("expected missing artifact, got {:?}", other),
        }
    }

    #[test]
    fn test_candidate_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BacktestEngine::new(returns(), BacktestConfig::new(d(1), d(10))).unwrap();
        let mut pool = AlphaPool::new(engine, config(dir.path())).unwrap();

        pool.add(&factor(1), "alpha_001").unwrap();
        pool.add(&factor(1).negate(), "alpha_neg").unwrap();
        let before = pool.get("alpha_001").cloned();

        let table = pool.evaluate_candidate(&factor(1), "candidate", None).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].name(), "candidate");
        assert_eq!(table.rows()[0].similarity, Some(1.0));

        let same = table.row("alpha_001").unwrap().similarity.unwrap();
        let opposite = table.row("alpha_neg").unwrap().similarity.unwrap();
        assert!((same - 1.0).abs() < 1e-9);
        assert!((opposite + 1.0).abs() < 1e-9);

        // candidate is neither stored nor persisted, pooled rows are untouched
        assert_eq!(pool.len(), 2);
        assert!(!dir.path().join("candidate").exists());
        assert_eq!(pool.get("alpha_001").cloned(), before);

        let sorted = pool
            .evaluate_candidate(&factor(1), "candidate", Some("similarity"))
            .unwrap();
        assert_eq!(sorted.rows().last().unwrap().name(), "alpha_neg");
    }

    #[test]
    fn test_candidate_with_unknown_sort_key() {
        let dir = tempfile::tempdir().unwrap();
        let pool = AlphaPool::new(CountingEvaluator::new(), config(dir.path())).unwrap();

        let result = pool.evaluate_candidate(&factor(1), "candidate", Some("alpha"));
        assert!(matches!(result, Err(AlphaError::InvalidSortKey { .. })));
        assert_eq!(pool.evaluator().calls.get(), 0);
    }

    #[test]
    fn test_remove_keeps_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = AlphaPool::new(CountingEvaluator::new(), config(dir.path())).unwrap();
        pool.add(&factor(1), "alpha_001").unwrap();

        assert!(pool.remove("alpha_001").is_some());
        assert!(pool.is_empty());
        assert_eq!(pool.load_existing().unwrap(), 1);
    }
}
