//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::error::{Error, Result};

/// Customer segmentation, price elasticity and demand forecasting over a
/// transaction CSV
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the transaction CSV file
    #[arg(short, long, default_value = "transactions.csv")]
    pub input: String,

    /// Number of customer segments for K-Means
    #[arg(short = 'k', long, default_value_t = 4)]
    pub clusters: usize,

    /// Random seed for reproducible clustering
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Product category to analyze ("all" for the whole table)
    #[arg(short, long, default_value = "all")]
    pub category: String,

    /// Forecast horizon in periods
    #[arg(long, default_value_t = 90)]
    pub horizon: usize,

    /// Forecast frequency: D (daily) or W (weekly)
    #[arg(long, default_value = "D")]
    pub freq: String,

    /// Cross-price elasticity pair as "demand_category:price_category"
    #[arg(long)]
    pub cross: Option<String>,

    /// Steps for the revenue-maximizing price sweep
    #[arg(long, default_value_t = 100)]
    pub steps: usize,

    /// Write the segment-enriched table to this CSV path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Category filter for the estimators; "all" means no filter.
    pub fn category_filter(&self) -> Option<&str> {
        if self.category == "all" {
            None
        } else {
            Some(self.category.as_str())
        }
    }

    /// Parse the cross-elasticity pair from the `--cross` flag.
    /// Expected format: "demand_category:price_category"
    pub fn parse_cross_pair(&self) -> Result<Option<(&str, &str)>> {
        let Some(raw) = self.cross.as_deref() else {
            return Ok(None);
        };
        match raw.split_once(':') {
            Some((demand, price)) if !demand.is_empty() && !price.is_empty() => {
                Ok(Some((demand.trim(), price.trim())))
            }
            _ => Err(Error::InvalidRequest(format!(
                "cross pair must be 'demand_category:price_category', got '{raw}'"
            ))),
        }
    }
}
