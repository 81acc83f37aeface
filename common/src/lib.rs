//! Shared data model for the alpha research toolkit
//!
//! Panels of per-date, per-instrument values with explicit missing entries,
//! the statistics conventions every component agrees on, and the error
//! taxonomy surfaced to callers.

pub mod error;
pub mod panel;
pub mod stats;

pub use error::{AlphaError, Result};
pub use panel::{parse_date, Panel, Series};
pub use stats::TRADING_DAYS_PER_YEAR;

pub use chrono::NaiveDate;
