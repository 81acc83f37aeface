//! On-disk artifacts of factor evaluations
//!
//! Layout under the store root, one directory per factor:
//! `{root}/{name}/{name}_{start}_{end}_{universe}_{artifact}.csv` with
//! compact `%Y%m%d` dates.

use chrono::NaiveDate;
use common::{AlphaError, Panel, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::engine::BacktestReport;
use crate::metrics::MetricsRecord;

const METRIC_HEADER: &str = "metric";

/// Kind of file persisted for an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Alpha,
    Ic,
    Weight,
    Pnl,
    Metrics,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Alpha => "alpha",
            ArtifactKind::Ic => "ic",
            ArtifactKind::Weight => "weight",
            ArtifactKind::Pnl => "pnl",
            ArtifactKind::Metrics => "metrics",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one evaluation: factor name, window and universe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub universe: String,
}

impl ArtifactKey {
    pub fn new(name: &str, start: NaiveDate, end: NaiveDate, universe: &str) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
            universe: universe.to_string(),
        }
    }

    pub fn for_report(report: &BacktestReport) -> Self {
        Self::new(&report.name, report.start, report.end, &report.universe)
    }

    /// File name prefix shared by every artifact of this evaluation
    pub fn stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.name,
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d"),
            self.universe
        )
    }

    pub fn file_name(&self, kind: ArtifactKind) -> String {
        format!("{}_{}.csv", self.stem(), kind)
    }
}

/// Reads and writes evaluation artifacts under a root directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn factor_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn path(&self, key: &ArtifactKey, kind: ArtifactKind) -> PathBuf {
        self.factor_dir(&key.name).join(key.file_name(kind))
    }

    pub fn exists(&self, key: &ArtifactKey, kind: ArtifactKind) -> bool {
        self.path(key, kind).is_file()
    }

    /// Persist a factor panel as the `alpha` artifact
    pub fn write_factor(&self, key: &ArtifactKey, factor: &Panel) -> Result<PathBuf> {
        let path = self.prepare(key, ArtifactKind::Alpha)?;
        data_ingestion::write_panel(&path, factor)?;
        Ok(path)
    }

    pub fn read_factor(&self, key: &ArtifactKey) -> Result<Panel> {
        let path = self.existing(key, ArtifactKind::Alpha)?;
        data_ingestion::read_panel(&path)
    }

    /// Persist metrics as a `metric,{name}` table, one row per metric
    pub fn write_metrics(&self, key: &ArtifactKey, metrics: &MetricsRecord) -> Result<PathBuf> {
        let path = self.prepare(key, ArtifactKind::Metrics)?;
        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;

        writer
            .write_record([METRIC_HEADER, metrics.name.as_str()])
            .map_err(csv_error)?;
        for column in MetricsRecord::columns() {
            let value = metrics.get(column).map(|v| v.to_string()).unwrap_or_default();
            writer.write_record([*column, value.as_str()]).map_err(csv_error)?;
        }

        writer.flush()?;
        Ok(path)
    }

    pub fn read_metrics(&self, key: &ArtifactKey) -> Result<MetricsRecord> {
        let path = self.existing(key, ArtifactKind::Metrics)?;
        let mut reader = csv::Reader::from_path(&path).map_err(csv_error)?;

        let headers = reader.headers().map_err(csv_error)?.clone();
        if headers.get(0) != Some(METRIC_HEADER) || headers.len() != 2 {
            return Err(AlphaError::Parse(format!(
                "{} is not a metrics table",
                path.display()
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let column = record.get(0).unwrap_or_default().to_string();
            let cell = record.get(1).unwrap_or_default().trim();
            let value = if cell.is_empty() {
                None
            } else {
                Some(cell.parse::<f64>().map_err(|e| {
                    AlphaError::Parse(format!("metric '{}' in {}: {}", column, path.display(), e))
                })?)
            };
            rows.push((column, value));
        }

        MetricsRecord::from_rows(&key.name, rows.iter().map(|(c, v)| (c.as_str(), *v)))
    }

    /// Persist whichever outputs the report carries
    pub fn write_report(&self, report: &BacktestReport) -> Result<Vec<PathBuf>> {
        let key = ArtifactKey::for_report(report);
        let mut written = Vec::new();

        if let Some(ic) = &report.ic {
            let path = self.prepare(&key, ArtifactKind::Ic)?;
            data_ingestion::write_series(&path, &[("ic", &ic.ic), ("rank_ic", &ic.rank_ic)])?;
            written.push(path);
        }
        if let Some(weights) = &report.weights {
            let path = self.prepare(&key, ArtifactKind::Weight)?;
            data_ingestion::write_panel(&path, weights)?;
            written.push(path);
        }
        if let Some(pnl) = &report.pnl {
            let path = self.prepare(&key, ArtifactKind::Pnl)?;
            data_ingestion::write_series(&path, &[("pnl", pnl)])?;
            written.push(path);
        }
        if let Some(metrics) = &report.metrics {
            written.push(self.write_metrics(&key, metrics)?);
        }

        info!(factor = %report.name, files = written.len(), "Saved backtest artifacts");
        Ok(written)
    }

    /// Names of the factor directories under the root, sorted
    pub fn factor_names(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn prepare(&self, key: &ArtifactKey, kind: ArtifactKind) -> Result<PathBuf> {
        std::fs::create_dir_all(self.factor_dir(&key.name))?;
        let path = self.path(key, kind);
        debug!(path = %path.display(), "Writing artifact");
        Ok(path)
    }

    fn existing(&self, key: &ArtifactKey, kind: ArtifactKind) -> Result<PathBuf> {
        let path = self.path(key, kind);
        if !path.is_file() {
            return Err(AlphaError::MissingArtifact { path });
        }
        Ok(path)
    }
}

fn csv_error(e: csv::Error) -> AlphaError {
    AlphaError::Csv(e.to_string())
}
