// Cross-sectional normalization
// Per-date standardization and winsorization of factor panels

use common::{stats, Panel};
use tracing::debug;

/// Clip bound in cross-sectional standard deviations
pub const OUTLIER_SIGMAS: f64 = 5.0;

/// Standardize each date: subtract the cross-sectional mean, divide by the
/// cross-sectional standard deviation.
///
/// A date with zero or undefined dispersion comes out entirely missing.
pub fn zscore(panel: &Panel) -> Panel {
    panel.map_rows(|row| {
        let values = stats::defined(row);
        let (Some(mean), Some(sd)) = (stats::mean(&values), stats::std_dev(&values)) else {
            return vec![None; row.len()];
        };
        if sd == 0.0 {
            return vec![None; row.len()];
        }
        row.iter().map(|v| v.map(|x| (x - mean) / sd)).collect()
    })
}

/// Clamp each date's values into `[mean - 5 sd, mean + 5 sd]`.
///
/// Values inside the band are untouched; dates whose dispersion is undefined
/// are returned as is.
pub fn clip_outliers(panel: &Panel) -> Panel {
    clip_outliers_with(panel, OUTLIER_SIGMAS)
}

/// Winsorize at `mean +/- sigmas * sd` per date
pub fn clip_outliers_with(panel: &Panel, sigmas: f64) -> Panel {
    let clipped = panel.map_rows(|row| {
        let values = stats::defined(row);
        let (Some(mean), Some(sd)) = (stats::mean(&values), stats::std_dev(&values)) else {
            return row.to_vec();
        };
        let lower = mean - sigmas * sd;
        let upper = mean + sigmas * sd;
        row.iter()
            .map(|v| {
                v.map(|x| {
                    if x > upper {
                        upper
                    } else if x < lower {
                        lower
                    } else {
                        x
                    }
                })
            })
            .collect()
    });
    debug!(dates = panel.n_dates(), sigmas = sigmas, "Clipped cross-sectional outliers");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 2, day).unwrap()
    }

    fn cols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{}", i)).collect()
    }

    #[test]
    fn test_zscore_standardizes_each_date() {
        let panel = Panel::from_rows(
            vec![d(1), d(2)],
            cols(3),
            vec![vec![1.0, 2.0, 3.0], vec![10.0, f64::NAN, 30.0]],
        )
        .unwrap();
        let z = zscore(&panel);

        assert_eq!(z.row(0), &[Some(-1.0), Some(0.0), Some(1.0)]);
        let sd = (200.0_f64).sqrt();
        assert!((z.row(1)[0].unwrap() + 10.0 / sd).abs() < 1e-12);
        assert_eq!(z.row(1)[1], None);
    }

    #[test]
    fn test_zscore_constant_row_is_missing() {
        let panel = Panel::from_rows(
            vec![d(1), d(2)],
            cols(3),
            vec![vec![4.0, 4.0, 4.0], vec![1.0, 2.0, 3.0]],
        )
        .unwrap();
        let z = zscore(&panel);

        assert_eq!(z.row(0), &[None, None, None]);
        assert!(z.row(1).iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_clip_outliers_only_touches_outliers() {
        let mut row: Vec<f64> = vec![0.0; 30];
        row[0] = 1000.0;
        row[1] = 1.0;
        row[2] = -1.0;
        let panel = Panel::from_rows(vec![d(1)], cols(30), vec![row.clone()]).unwrap();

        let values: Vec<f64> = row.clone();
        let mean = stats::mean(&values).unwrap();
        let sd = stats::std_dev(&values).unwrap();
        let upper = mean + 5.0 * sd;
        assert!(upper < 1000.0);

        let clipped = clip_outliers(&panel);
        assert!((clipped.row(0)[0].unwrap() - upper).abs() < 1e-9);
        assert_eq!(clipped.row(0)[1], Some(1.0));
        assert_eq!(clipped.row(0)[2], Some(-1.0));
        assert_eq!(&clipped.row(0)[3..], &panel.row(0)[3..]);

        for v in clipped.row(0).iter().flatten() {
            assert!(*v <= upper + 1e-9 && *v >= mean - 5.0 * sd - 1e-9);
        }
    }

    #[test]
    fn test_clip_outliers_keeps_undefined_dispersion_rows() {
        let panel = Panel::from_rows(vec![d(1)], cols(2), vec![vec![7.0, f64::NAN]]).unwrap();
        assert_eq!(clip_outliers(&panel), panel);
    }
}
