// Factor Correlation Analysis
// Cross-sectional similarity between factor panels and trailing time-series correlation

use common::{stats, AlphaError, Panel, Result, Series};
use tracing::debug;

/// Per-date cross-sectional correlation between two panels.
///
/// Both panels must carry the identical, identically ordered date index.
/// Instruments are matched by id; a date with fewer than two paired
/// observations yields `None`.
pub fn cross_sectional_correlation_series(x: &Panel, y: &Panel) -> Result<Series> {
    if !x.same_dates(y) {
        return Err(AlphaError::IndexMismatch(format!(
            "x and y should have the same index ({} vs {} dates)",
            x.n_dates(),
            y.n_dates()
        )));
    }

    let y = if x.columns() == y.columns() {
        y.clone()
    } else {
        y.reindex_columns(x.columns())
    };

    let values = x
        .values()
        .iter()
        .zip(y.values().iter())
        .map(|(a, b)| stats::pearson_pairwise(a, b))
        .collect();

    Series::new(x.dates().to_vec(), values)
}

/// Mean over dates of the cross-sectional correlation between `x` and `y`.
///
/// Dates where the correlation is undefined are skipped; `None` when no date
/// has a defined value.
pub fn cross_sectional_correlation(x: &Panel, y: &Panel) -> Result<Option<f64>> {
    let series = cross_sectional_correlation_series(x, y)?;
    let defined = series.defined();
    let mean = stats::mean(&defined);
    debug!(
        dates = series.len(),
        defined = defined.len(),
        mean = ?mean,
        "Computed cross-sectional correlation"
    );
    Ok(mean)
}

/// Trailing-window correlation of two series.
///
/// Entry t uses observations `t + 1 - window ..= t`; the first `window - 1`
/// entries, and any window containing a missing value, are `None`.
pub fn rolling_correlation_series(x: &Series, y: &Series, window: usize) -> Result<Series> {
    if x.dates() != y.dates() {
        return Err(AlphaError::IndexMismatch(
            "x and y should have the same index".to_string(),
        ));
    }
    check_window(window)?;

    let values = rolling(x.values(), y.values(), window);
    Series::new(x.dates().to_vec(), values)
}

/// Column-by-column trailing-window correlation of two panels.
///
/// Instruments are matched by id over the columns of `x`.
pub fn rolling_correlation(x: &Panel, y: &Panel, window: usize) -> Result<Panel> {
    if !x.same_dates(y) {
        return Err(AlphaError::IndexMismatch(
            "x and y should have the same index".to_string(),
        ));
    }
    check_window(window)?;

    let y = y.reindex_columns(x.columns());
    let n = x.n_dates();
    let mut values = vec![vec![None; x.n_columns()]; n];

    for j in 0..x.n_columns() {
        let xs: Vec<Option<f64>> = x.values().iter().map(|row| row[j]).collect();
        let ys: Vec<Option<f64>> = y.values().iter().map(|row| row[j]).collect();
        for (i, c) in rolling(&xs, &ys, window).into_iter().enumerate() {
            values[i][j] = c;
        }
    }

    Panel::new(x.dates().to_vec(), x.columns().to_vec(), values)
}

fn check_window(window: usize) -> Result<()> {
    if window == 0 {
        return Err(AlphaError::InvalidConfig(
            "rolling window must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn rolling(x: &[Option<f64>], y: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..x.len())
        .map(|t| {
            if t + 1 < window {
                return None;
            }
            let range = t + 1 - window..=t;
            let (a, b) = stats::paired(&x[range.clone()], &y[range]);
            if a.len() < window {
                return None;
            }
            stats::pearson(&a, &b)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::NaiveDate;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|day| NaiveDate::from_ymd_opt(2022, 3, day).unwrap())
            .collect()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn factor() -> Panel {
        Panel::from_rows(
            dates(3),
            cols(&["A", "B", "C"]),
            vec![
                vec![1.0, 2.0, 3.0],
                vec![3.0, f64::NAN, 1.0],
                vec![0.5, 0.2, 0.9],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_self_correlation_is_one() {
        let corr = cross_sectional_correlation(&factor(), &factor()).unwrap().unwrap();
        assert!((corr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_negated_panel_correlates_at_minus_one() {
        let corr = cross_sectional_correlation(&factor(), &factor().negate())
            .unwrap()
            .unwrap();
        assert!((corr + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_dates_fail() {
        let shorter = factor().slice_dates(dates(3)[0], dates(3)[1]);
        let result = cross_sectional_correlation(&factor(), &shorter);
        assert!(matches!(result, Err(AlphaError::IndexMismatch(_))));
    }

    #[test]
    fn test_undefined_dates_are_skipped() {
        let other = Panel::from_rows(
            dates(3),
            cols(&["A", "B", "C"]),
            vec![
                vec![2.0, 4.0, 6.0],
                vec![f64::NAN, 1.0, f64::NAN],
                vec![5.0, 5.0, 5.0],
            ],
        )
        .unwrap();
        let series = cross_sectional_correlation_series(&factor(), &other).unwrap();
        assert_eq!(series.values()[1], None);
        assert_eq!(series.values()[2], None);

        let corr = cross_sectional_correlation(&factor(), &other).unwrap().unwrap();
        assert!((corr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_columns_are_matched_by_id() {
        let reordered = factor().reindex_columns(&cols(&["C", "A", "B"]));
        let corr = cross_sectional_correlation(&factor(), &reordered).unwrap().unwrap();
        assert!((corr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_correlation_warmup() {
        let x = Series::new(
            dates(5),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
        )
        .unwrap();
        let y = Series::new(
            dates(5),
            vec![Some(2.0), Some(4.0), Some(6.0), None, Some(10.0)],
        )
        .unwrap();

        let rolled = rolling_correlation_series(&x, &y, 3).unwrap();
        assert_eq!(rolled.values()[0], None);
        assert_eq!(rolled.values()[1], None);
        assert!((rolled.values()[2].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(rolled.values()[3], None);
        assert_eq!(rolled.values()[4], None);

        assert!(rolling_correlation_series(&x, &y, 0).is_err());
    }

    #[test]
    fn test_rolling_correlation_panel() {
        let rolled = rolling_correlation(&factor(), &factor(), 2).unwrap();
        assert_eq!(rolled.row(0), &[None, None, None]);
        assert!((rolled.row(1)[0].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(rolled.row(1)[1], None);
        assert!((rolled.row(2)[2].unwrap() - 1.0).abs() < 1e-12);
    }
}
