//! demandlens: analytics core for e-commerce transaction data.
//!
//! Turns a flat transaction table into customer segments (RFM features +
//! seeded k-means), own- and cross-price elasticity estimates (log-log OLS),
//! seasonal demand forecasts, and revenue-maximizing price recommendations.
//! The table is the only interchange format: collaborators own ingestion,
//! persistence and presentation, and hand the core a table value per call.

pub mod cli;
pub mod elasticity;
pub mod error;
pub mod features;
pub mod forecast;
pub mod pricing;
mod regression;
pub mod segmentation;
pub mod table;

pub use cli::Args;
pub use elasticity::{estimate, estimate_cross, CrossPolicy, CrossRelation, ElasticityModel};
pub use error::{Error, Result};
pub use forecast::{forecast, ForecastModel, ForecastRow, Frequency};
pub use pricing::{maximize_revenue, PriceBandPolicy, PriceRecommendation};
pub use segmentation::{apply_segments, segment, Segmentation, SegmentSummary};
pub use table::{Transaction, TransactionTable};
