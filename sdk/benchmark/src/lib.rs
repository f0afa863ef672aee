//! Paycloak Salary Benchmark
//!
//! Derives market statistics from a disclosed salary and the public
//! experience attribute stored next to it.
//!
//! ```text
//! industry_average = experience * 1500
//! percentile       = round(clamp((value / (experience * 2000)) * 10, 5, 95))
//!
//!   value > avg * 1.2  ──▶ High
//!   value < avg * 0.8  ──▶ Low
//!   otherwise          ──▶ Average
//! ```
//!
//! The calculator is only ever fed values that came out of a verified
//! decryption; it holds no state and performs no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Industry average paid per year of experience
pub const AVERAGE_PER_YEAR: u64 = 1500;

/// Divisor per year of experience used for the raw percentile
pub const PERCENTILE_BASE_PER_YEAR: f64 = 2000.0;

/// Scale applied to the salary/base ratio
pub const PERCENTILE_SCALE: f64 = 10.0;

/// Lowest reported percentile
pub const MIN_PERCENTILE: u8 = 5;

/// Highest reported percentile
pub const MAX_PERCENTILE: u8 = 95;

const HIGH_FACTOR: f64 = 1.2;
const LOW_FACTOR: f64 = 0.8;

/// Where a salary sits relative to the industry average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketPosition {
    Low,
    Average,
    High,
}

impl MarketPosition {
    /// Fixed recommendation text for this position
    pub fn recommendation(self) -> &'static str {
        match self {
            MarketPosition::High => "Above Market - Consider retention strategies",
            MarketPosition::Low => "Below Market - Review compensation",
            MarketPosition::Average => "Market Competitive",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketPosition::Low => "Low",
            MarketPosition::Average => "Average",
            MarketPosition::High => "High",
        }
    }
}

impl fmt::Display for MarketPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Benchmark derived from a disclosed value. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Percentile in `[MIN_PERCENTILE, MAX_PERCENTILE]`
    pub percentile: u8,
    /// Industry average for the experience level
    pub industry_average: u64,
    pub market_position: MarketPosition,
    pub recommendation: String,
}

impl BenchmarkResult {
    fn new(percentile: u8, industry_average: u64, market_position: MarketPosition) -> Self {
        Self {
            percentile,
            industry_average,
            market_position,
            recommendation: market_position.recommendation().to_string(),
        }
    }
}

/// Compute the market benchmark for `value` at `experience_years`.
///
/// Zero years of experience has no meaningful average, so it short-circuits
/// to an average of 0, the floor percentile and `MarketPosition::Low`.
pub fn compute_benchmark(value: u64, experience_years: u32) -> BenchmarkResult {
    if experience_years == 0 {
        return BenchmarkResult::new(MIN_PERCENTILE, 0, MarketPosition::Low);
    }

    let years = u64::from(experience_years);
    let industry_average = years * AVERAGE_PER_YEAR;

    let base = f64::from(experience_years) * PERCENTILE_BASE_PER_YEAR;
    let raw = (value as f64 / base) * PERCENTILE_SCALE;
    let percentile = raw
        .clamp(f64::from(MIN_PERCENTILE), f64::from(MAX_PERCENTILE))
        .round() as u8;

    BenchmarkResult::new(
        percentile,
        industry_average,
        market_position(value, industry_average),
    )
}

fn market_position(value: u64, industry_average: u64) -> MarketPosition {
    let value = value as f64;
    let average = industry_average as f64;

    if value > average * HIGH_FACTOR {
        MarketPosition::High
    } else if value < average * LOW_FACTOR {
        MarketPosition::Low
    } else {
        MarketPosition::Average
    }
}
