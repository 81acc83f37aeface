// Panel CSV format
// First column holds the trading date, remaining columns one instrument each.
// An empty cell is a missing value.

use common::{parse_date, AlphaError, NaiveDate, Panel, Result, Series};
use std::path::Path;

const DATE_HEADER: &str = "date";

pub(crate) fn csv_error(e: csv::Error) -> AlphaError {
    AlphaError::Csv(e.to_string())
}

fn parse_cell(cell: &str) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| AlphaError::Parse(format!("invalid number '{}': {}", cell, e)))
}

fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Read a date x instrument table
pub fn read_panel(path: &Path) -> Result<Panel> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;

    let headers = reader.headers().map_err(csv_error)?.clone();
    let columns: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

    let mut dates = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let mut cells = record.iter();
        let date = cells
            .next()
            .ok_or_else(|| AlphaError::PanelShape(format!("empty row in {}", path.display())))?;
        dates.push(parse_date(date)?);
        values.push(cells.map(parse_cell).collect::<Result<Vec<_>>>()?);
    }

    Panel::new(dates, columns, values)
}

/// Write a date x instrument table
pub fn write_panel(path: &Path, panel: &Panel) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

    let mut header = vec![DATE_HEADER.to_string()];
    header.extend(panel.columns().iter().cloned());
    writer.write_record(&header).map_err(csv_error)?;

    for (date, row) in panel.iter_rows() {
        let mut record = vec![format_date(date)];
        record.extend(row.iter().map(|v| format_cell(*v)));
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write several same-index series as columns of one table
pub fn write_series(path: &Path, columns: &[(&str, &Series)]) -> Result<()> {
    let Some((_, first)) = columns.first() else {
        return Err(AlphaError::PanelShape("no series to write".to_string()));
    };
    if columns.iter().any(|(_, s)| s.dates() != first.dates()) {
        return Err(AlphaError::IndexMismatch(
            "series written together must share one date index".to_string(),
        ));
    }

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

    let mut header = vec![DATE_HEADER.to_string()];
    header.extend(columns.iter().map(|(name, _)| name.to_string()));
    writer.write_record(&header).map_err(csv_error)?;

    for (i, date) in first.dates().iter().enumerate() {
        let mut record = vec![format_date(*date)];
        record.extend(columns.iter().map(|(_, s)| format_cell(s.values()[i])));
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read one named column of a table as a series
pub fn read_series(path: &Path, column: &str) -> Result<Series> {
    let panel = read_panel(path)?;
    let j = panel.column_position(column).ok_or_else(|| {
        AlphaError::PanelShape(format!("column '{}' not found in {}", column, path.display()))
    })?;
    let values = panel.values().iter().map(|row| row[j]).collect();
    Series::new(panel.dates().to_vec(), values)
}
