// Signal Normalizer
// Cross-sectional utilities applied to factor panels before and after backtesting

pub mod correlation;
pub mod normalize;

pub use correlation::{
    cross_sectional_correlation, cross_sectional_correlation_series, rolling_correlation,
    rolling_correlation_series,
};
pub use normalize::{clip_outliers, clip_outliers_with, zscore, OUTLIER_SIGMAS};
