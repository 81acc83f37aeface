//! Date x instrument panels and date-indexed series

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AlphaError, Result};
use crate::stats::finite;

/// 2-D numeric table: rows are trading dates, columns are instrument ids.
///
/// Dates are strictly increasing and unique, columns are unique. `None` marks
/// a missing entry; non-finite floats never survive construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl Panel {
    /// Build a panel, validating its index invariants
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        check_dates(&dates)?;

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(AlphaError::PanelShape(format!("duplicate column '{}'", column)));
            }
        }

        if values.len() != dates.len() {
            return Err(AlphaError::PanelShape(format!(
                "{} rows for {} dates",
                values.len(),
                dates.len()
            )));
        }

        let mut values = values;
        for (i, row) in values.iter_mut().enumerate() {
            if row.len() != columns.len() {
                return Err(AlphaError::PanelShape(format!(
                    "row {} has {} values for {} columns",
                    dates[i],
                    row.len(),
                    columns.len()
                )));
            }
            for v in row.iter_mut() {
                *v = v.and_then(finite);
            }
        }

        Ok(Self { dates, columns, values })
    }

    /// Build from plain floats, NaN marks a missing entry
    pub fn from_rows(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let values = rows
            .into_iter()
            .map(|row| row.into_iter().map(finite).collect())
            .collect();
        Self::new(dates, columns, values)
    }

    /// Panel with every entry set to `value`
    pub fn filled(dates: Vec<NaiveDate>, columns: Vec<String>, value: Option<f64>) -> Result<Self> {
        let values = vec![vec![value; columns.len()]; dates.len()];
        Self::new(dates, columns, values)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Vec<Option<f64>>] {
        &self.values
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Row position of a date
    pub fn date_position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Column position of an instrument
    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn row(&self, i: usize) -> &[Option<f64>] {
        &self.values[i]
    }

    pub fn row_for(&self, date: NaiveDate) -> Option<&[Option<f64>]> {
        self.date_position(date).map(|i| self.values[i].as_slice())
    }

    pub fn get(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let i = self.date_position(date)?;
        let j = self.column_position(column)?;
        self.values[i][j]
    }

    /// Iterate `(date, row)` pairs in date order
    pub fn iter_rows(&self) -> impl Iterator<Item = (NaiveDate, &[Option<f64>])> {
        self.dates
            .iter()
            .copied()
            .zip(self.values.iter().map(|r| r.as_slice()))
    }

    /// Whether both panels carry the identical, identically ordered date index
    pub fn same_dates(&self, other: &Panel) -> bool {
        self.dates == other.dates
    }

    /// Move values `periods` rows later (positive) or earlier (negative).
    ///
    /// Rows without a source become entirely missing.
    pub fn shift(&self, periods: isize) -> Panel {
        let n = self.dates.len() as isize;
        let width = self.columns.len();
        let values = (0..n)
            .map(|i| {
                let src = i - periods;
                if src >= 0 && src < n {
                    self.values[src as usize].clone()
                } else {
                    vec![None; width]
                }
            })
            .collect();

        Panel {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Rows with `start <= date <= end`
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Panel {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end).max(lo);

        Panel {
            dates: self.dates[lo..hi].to_vec(),
            columns: self.columns.clone(),
            values: self.values[lo..hi].to_vec(),
        }
    }

    /// Apply `f` to every defined entry
    pub fn map<F>(&self, f: F) -> Panel
    where
        F: Fn(f64) -> f64,
    {
        self.map_rows(|row| row.iter().map(|v| v.map(&f)).collect())
    }

    /// Rebuild each row with `f`; the closure must keep the row width
    pub fn map_rows<F>(&self, f: F) -> Panel
    where
        F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        let width = self.columns.len();
        let values = self
            .values
            .iter()
            .map(|row| {
                let mut out = f(row);
                out.resize(width, None);
                out.into_iter().map(|v| v.and_then(finite)).collect()
            })
            .collect();

        Panel {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    pub fn negate(&self) -> Panel {
        self.map(|v| -v)
    }

    /// Simple percentage change against the previous row.
    ///
    /// Missing when either endpoint is missing or the previous value is zero.
    pub fn pct_change(&self) -> Panel {
        let width = self.columns.len();
        let mut values = Vec::with_capacity(self.values.len());
        for i in 0..self.values.len() {
            if i == 0 {
                values.push(vec![None; width]);
                continue;
            }
            let row = self.values[i]
                .iter()
                .zip(self.values[i - 1].iter())
                .map(|(cur, prev)| match (cur, prev) {
                    (Some(c), Some(p)) if *p != 0.0 => finite(c / p - 1.0),
                    _ => None,
                })
                .collect();
            values.push(row);
        }

        Panel {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Reindex columns, instruments absent from this panel become missing
    pub fn reindex_columns(&self, columns: &[String]) -> Panel {
        let positions: Vec<Option<usize>> =
            columns.iter().map(|c| self.column_position(c)).collect();
        let values = self
            .values
            .iter()
            .map(|row| positions.iter().map(|p| p.and_then(|j| row[j])).collect())
            .collect();

        Panel {
            dates: self.dates.clone(),
            columns: columns.to_vec(),
            values,
        }
    }

    /// Keep entries whose mask value is 1; everything else becomes missing.
    ///
    /// Dates or instruments the mask does not cover are treated as excluded.
    pub fn mask_with(&self, mask: &Panel) -> Panel {
        let col_map: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| mask.column_position(c))
            .collect();

        let values = self
            .iter_rows()
            .map(|(date, row)| match mask.row_for(date) {
                Some(mask_row) => row
                    .iter()
                    .zip(col_map.iter())
                    .map(|(v, j)| match j.and_then(|j| mask_row[j]) {
                        Some(m) if m == 1.0 => *v,
                        _ => None,
                    })
                    .collect(),
                None => vec![None; row.len()],
            })
            .collect();

        Panel {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Number of defined entries
    pub fn count_defined(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_some()).count()
    }
}

/// Date-indexed column of optional values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl Series {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Result<Self> {
        check_dates(&dates)?;
        if values.len() != dates.len() {
            return Err(AlphaError::PanelShape(format!(
                "{} values for {} dates",
                values.len(),
                dates.len()
            )));
        }
        let values = values.into_iter().map(|v| v.and_then(finite)).collect();
        Ok(Self { dates, values })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        let i = self.dates.binary_search(&date).ok()?;
        self.values[i]
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied().flatten()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    /// Defined values in date order
    pub fn defined(&self) -> Vec<f64> {
        crate::stats::defined(&self.values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    pub fn shift(&self, periods: isize) -> Series {
        let n = self.values.len() as isize;
        let values = (0..n)
            .map(|i| {
                let src = i - periods;
                if src >= 0 && src < n {
                    self.values[src as usize]
                } else {
                    None
                }
            })
            .collect();
        Series {
            dates: self.dates.clone(),
            values,
        }
    }

    pub fn fill_missing(&self, value: f64) -> Series {
        Series {
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| Some(v.unwrap_or(value))).collect(),
        }
    }

    /// Simple percentage change against the previous entry
    pub fn pct_change(&self) -> Series {
        let mut values = Vec::with_capacity(self.values.len());
        for i in 0..self.values.len() {
            let v = if i == 0 {
                None
            } else {
                match (self.values[i], self.values[i - 1]) {
                    (Some(c), Some(p)) if p != 0.0 => finite(c / p - 1.0),
                    _ => None,
                }
            };
            values.push(v);
        }
        Series {
            dates: self.dates.clone(),
            values,
        }
    }
}

fn check_dates(dates: &[NaiveDate]) -> Result<()> {
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(AlphaError::IndexMismatch(format!(
            "dates must be strictly increasing, found {} followed by {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Parse a trading date written as `%Y-%m-%d` or `%Y%m%d`
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y%m%d"))
        .map_err(|e| AlphaError::Parse(format!("invalid date '{}': {}", text, e)))
}
