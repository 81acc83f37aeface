//! Missing-aware statistics helpers
//!
//! Every helper returns `None` where a float computation would yield NaN or an
//! infinity, so undefined results stay explicit all the way downstream.

use statrs::statistics::Statistics;

/// Annualization constant for daily data
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Map non-finite floats to `None`
pub fn finite(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Collect the defined entries of a row or series
pub fn defined(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().filter_map(|v| *v).collect()
}

/// Arithmetic mean, `None` when there is nothing to average
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().mean())
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    finite(values.iter().std_dev())
}

/// Mean divided by standard deviation
pub fn information_ratio(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let sd = std_dev(values)?;
    if sd == 0.0 {
        return None;
    }
    finite(m / sd)
}

/// Pairwise-complete observations of two equally long rows
pub fn paired(x: &[Option<f64>], y: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some((*a, *b)),
            _ => None,
        })
        .unzip()
}

/// Pearson correlation of two complete samples
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let sd_x = std_dev(x)?;
    let sd_y = std_dev(y)?;
    if sd_x == 0.0 || sd_y == 0.0 {
        return None;
    }

    let cov = x.iter().covariance(y.iter());
    finite(cov / (sd_x * sd_y)).map(|c| c.clamp(-1.0, 1.0))
}

/// Spearman rank correlation of two complete samples
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    pearson(&rank(x), &rank(y))
}

/// Pearson correlation ignoring positions where either side is missing
pub fn pearson_pairwise(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let (a, b) = paired(x, y);
    pearson(&a, &b)
}

/// Spearman correlation ignoring positions where either side is missing
pub fn spearman_pairwise(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let (a, b) = paired(x, y);
    spearman(&a, &b)
}

/// Ranks starting at 1, ties share their average rank
pub fn rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && indexed[j].1 == indexed[i].1 {
            j += 1;
        }

        let avg_rank = (i + j) as f64 / 2.0 + 0.5;
        for item in &indexed[i..j] {
            ranks[item.0] = avg_rank;
        }

        i = j;
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_sample_std_dev() {
        let sd = std_dev(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(close(sd, (5.0_f64 / 3.0).sqrt()));
        assert_eq!(std_dev(&[1.0]), None);
    }

    #[test]
    fn test_rank_with_ties() {
        assert_eq!(rank(&[10.0, 30.0, 20.0, 20.0]), vec![1.0, 4.0, 2.5, 2.5]);
    }

    #[test]
    fn test_pearson_degenerate_cases() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        let c = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!(close(c, 1.0));
    }

    #[test]
    fn test_spearman_is_monotone_invariant() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 8.0, 27.0, 64.0];
        assert!(close(spearman(&x, &y).unwrap(), 1.0));
        assert!(pearson(&x, &y).unwrap() < 1.0);
    }

    #[test]
    fn test_pairwise_drops_missing_positions() {
        let x = [Some(1.0), None, Some(3.0), Some(4.0)];
        let y = [Some(2.0), Some(9.0), None, Some(8.0)];
        let (a, b) = paired(&x, &y);
        assert_eq!(a, vec![1.0, 4.0]);
        assert_eq!(b, vec![2.0, 8.0]);
        assert!(close(pearson_pairwise(&x, &y).unwrap(), 1.0));
    }

    #[test]
    fn test_information_ratio() {
        assert_eq!(information_ratio(&[0.25, 0.25, 0.25]), None);
        let ir = information_ratio(&[0.1, 0.3]).unwrap();
        assert!(close(ir, 0.2 / 0.02_f64.sqrt()));
    }
}
