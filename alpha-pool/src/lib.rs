//! Alpha Pool
//!
//! Keeps the factors already evaluated for one window and universe and
//! compares new candidates against them by metrics and cross-sectional
//! similarity.

mod config;
mod pool;
mod report;

pub use config::{load_config, save_config, PoolConfig};
pub use pool::{AlphaPool, PoolEntry};
pub use report::{ComparisonRow, ComparisonTable, SIMILARITY_COLUMN};
