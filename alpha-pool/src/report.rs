//! Candidate-versus-pool comparison table

use backtest::MetricsRecord;
use common::{AlphaError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Column holding the candidate's correlation with each row's factor
pub const SIMILARITY_COLUMN: &str = "similarity";

const NAME_WIDTH: usize = 20;
const VALUE_WIDTH: usize = 14;

/// One factor's metrics plus its similarity to the candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub metrics: MetricsRecord,
    pub similarity: Option<f64>,
}

impl ComparisonRow {
    pub fn name(&self) -> &str {
        &self.metrics.name
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        if column == SIMILARITY_COLUMN {
            self.similarity
        } else {
            self.metrics.get(column)
        }
    }
}

/// Candidate row followed by one row per pooled factor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonTable {
    candidate: String,
    rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn new(candidate: &str, rows: Vec<ComparisonRow>) -> Self {
        Self {
            candidate: candidate.to_string(),
            rows,
        }
    }

    /// Metric columns followed by the similarity column
    pub fn columns() -> Vec<&'static str> {
        let mut columns = MetricsRecord::columns().to_vec();
        columns.push(SIMILARITY_COLUMN);
        columns
    }

    /// Fails with `InvalidSortKey` unless `column` is a table column
    pub fn check_column(column: &str) -> Result<()> {
        if column == SIMILARITY_COLUMN || MetricsRecord::has_column(column) {
            return Ok(());
        }
        Err(AlphaError::InvalidSortKey {
            key: column.to_string(),
            available: Self::columns().into_iter().map(String::from).collect(),
        })
    }

    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn row(&self, name: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.name() == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Order rows by `column`, largest first, undefined values last
    pub fn sort_by(&mut self, column: &str) -> Result<()> {
        Self::check_column(column)?;
        self.rows
            .sort_by(|a, b| match (a.get(column), b.get(column)) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        Ok(())
    }
}

impl fmt::Display for ComparisonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = Self::columns();
        // at least one space between adjacent headers
        let widths: Vec<usize> = columns
            .iter()
            .map(|c| VALUE_WIDTH.max(c.len() + 1))
            .collect();
        let name_width = self
            .rows
            .iter()
            .map(|r| r.name().len() + 1)
            .fold(NAME_WIDTH, usize::max);

        write!(f, "{:<width$}", "name", width = name_width)?;
        for (column, width) in columns.iter().zip(&widths) {
            write!(f, "{:>width$}", column, width = *width)?;
        }
        writeln!(f)?;

        for row in &self.rows {
            write!(f, "{:<width$}", row.name(), width = name_width)?;
            for (column, width) in columns.iter().zip(&widths) {
                match row.get(column) {
                    Some(v) => write!(f, "{:>width$.4}", v, width = *width)?,
                    None => write!(f, "{:>width$}", "-", width = *width)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, sharpe: Option<f64>, similarity: Option<f64>) -> ComparisonRow {
        ComparisonRow {
            metrics: MetricsRecord {
                sharpe_ratio: sharpe,
                ..MetricsRecord::empty(name)
            },
            similarity,
        }
    }

    fn table() -> ComparisonTable {
        ComparisonTable::new(
            "candidate",
            vec![
                row("candidate", Some(0.8), Some(1.0)),
                row("momentum", None, Some(0.3)),
                row("value", Some(1.4), Some(-0.2)),
                row("size", Some(0.1), None),
            ],
        )
    }

    fn names(table: &ComparisonTable) -> Vec<&str> {
        table.rows().iter().map(|r| r.name()).collect()
    }

    #[test]
    fn test_sort_descending_with_undefined_last() {
        let mut table = table();
        table.sort_by("sharpe_ratio").unwrap();
        assert_eq!(names(&table), vec!["value", "candidate", "size", "momentum"]);

        table.sort_by(SIMILARITY_COLUMN).unwrap();
        assert_eq!(names(&table), vec!["candidate", "momentum", "value", "size"]);
    }

    #[test]
    fn test_unknown_sort_key() {
        let mut table = table();
        match table.sort_by("turnover") {
            Err(AlphaError::InvalidSortKey { key, available }) => {
                assert_eq!(key, "turnover");
                assert!(available.contains(&"ic_mean".to_string()));
                assert!(available.contains(&SIMILARITY_COLUMN.to_string()));
            }
            other => panic!("expected invalid sort key, got {:?}", other),
        }
        assert_eq!(names(&table), vec!["candidate", "momentum", "value", "size"]);
    }

    #[test]
    fn test_json_keeps_undefined_as_null() {
        let json: serde_json::Value = serde_json::from_str(&table().to_json().unwrap()).unwrap();
        assert_eq!(json["candidate"], "candidate");
        assert_eq!(json["rows"][0]["similarity"], 1.0);
        assert!(json["rows"][3]["similarity"].is_null());
        assert_eq!(json["rows"][2]["metrics"]["name"], "value");
    }

    #[test]
    fn test_display_lists_every_row() {
        let text = table().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("name"));
        assert!(lines[0].contains("similarity"));
        assert!(lines[1].starts_with("candidate"));
        assert!(lines[1].contains("1.0000"));
        assert!(lines[2].contains("-"));
    }

    #[test]
    fn test_display_separates_long_headers() {
        let text = table().to_string();
        let header: Vec<&str> = text.lines().next().unwrap().split_whitespace().collect();
        let mut expected = vec!["name"];
        expected.extend(ComparisonTable::columns());
        assert_eq!(header, expected);
        assert!(text.contains(" annualized_return "));
        assert!(text.contains(" annualized_volatility "));

        // every line has the same width, so values sit under their headers
        let widths: Vec<usize> = text.lines().map(str::len).collect();
        assert!(widths.iter().all(|w| *w == widths[0]));
    }
}
