//! Own- and cross-price elasticity via log-log regression.

use crate::error::Result;
use crate::features::{price_demand_curve, weekly_demand, weekly_mean_price};
use crate::regression::fit_simple;
use crate::table::TransactionTable;

/// Minimum distinct price points for an own-price fit.
pub const MIN_PRICE_POINTS: usize = 10;
/// Minimum overlapping weeks for a cross-price fit.
pub const MIN_OVERLAPPING_WEEKS: usize = 15;

/// Fitted log-log demand curve: `demand = exp(intercept + slope * ln(price))`.
///
/// The slope is the own-price elasticity — the percentage change in demand
/// per one percent change in price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticityModel {
    pub intercept: f64,
    pub slope: f64,
}

impl ElasticityModel {
    pub fn elasticity(&self) -> f64 {
        self.slope
    }

    /// Predicted demand at an arbitrary price. Non-positive prices yield NaN,
    /// which callers treat as a result-not-available condition.
    pub fn predict_demand(&self, price: f64) -> f64 {
        (self.intercept + self.slope * price.ln()).exp()
    }
}

/// Estimate own-price elasticity for a slice of the table (`None` category =
/// whole table).
///
/// `Ok(None)` covers the expected non-results: fewer than
/// [`MIN_PRICE_POINTS`] distinct prices, or a degenerate/unstable fit. A
/// per-category batch keeps going past them.
pub fn estimate(table: &TransactionTable, category: Option<&str>) -> Result<Option<ElasticityModel>> {
    let curve = price_demand_curve(table, category);
    if curve.len() < MIN_PRICE_POINTS {
        tracing::warn!(
            category = category.unwrap_or("all"),
            price_points = curve.len(),
            "not enough unique price points for an elasticity model"
        );
        return Ok(None);
    }

    let log_price: Vec<f64> = curve.iter().map(|(p, _)| p.ln()).collect();
    let log_demand: Vec<f64> = curve.iter().map(|(_, d)| (*d as f64).ln()).collect();
    match fit_simple(&log_price, &log_demand) {
        Some(fit) => Ok(Some(ElasticityModel {
            intercept: fit.intercept,
            slope: fit.slope,
        })),
        None => {
            tracing::warn!(
                category = category.unwrap_or("all"),
                "log-log fit was degenerate, no elasticity model"
            );
            Ok(None)
        }
    }
}

/// Estimate the cross-price elasticity of `demand_category`'s weekly demand
/// against `price_category`'s weekly mean price.
///
/// Asking for the same category on both sides is own-price elasticity and
/// returns `Ok(None)` before any computation, as does an overlap shorter
/// than [`MIN_OVERLAPPING_WEEKS`].
pub fn estimate_cross(
    table: &TransactionTable,
    demand_category: &str,
    price_category: &str,
) -> Result<Option<f64>> {
    if demand_category == price_category {
        tracing::warn!(
            category = demand_category,
            "same category on both sides of a cross-price request"
        );
        return Ok(None);
    }

    let demand = weekly_demand(table, demand_category);
    let prices = weekly_mean_price(table, price_category);

    // Inner join on week, dropping weeks without positive demand and price.
    let mut log_price = Vec::new();
    let mut log_demand = Vec::new();
    for (week, &d) in &demand {
        if let Some(&p) = prices.get(week) {
            if d > 0 && p > 0.0 {
                log_demand.push((d as f64).ln());
                log_price.push(p.ln());
            }
        }
    }

    if log_price.len() < MIN_OVERLAPPING_WEEKS {
        tracing::warn!(
            demand_category,
            price_category,
            overlapping_weeks = log_price.len(),
            "not enough overlapping weekly data for cross-price elasticity"
        );
        return Ok(None);
    }

    Ok(fit_simple(&log_price, &log_demand).map(|fit| fit.slope))
}

/// How two categories relate given a cross-price coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossRelation {
    Substitutes,
    Complements,
    Unrelated,
}

impl std::fmt::Display for CrossRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CrossRelation::Substitutes => "substitutes",
            CrossRelation::Complements => "complements",
            CrossRelation::Unrelated => "unrelated",
        };
        f.write_str(s)
    }
}

/// Classification thresholds for cross-price coefficients. These are policy,
/// not statistics: tune them per domain.
#[derive(Debug, Clone, Copy)]
pub struct CrossPolicy {
    pub substitute_above: f64,
    pub complement_below: f64,
}

impl Default for CrossPolicy {
    fn default() -> Self {
        Self {
            substitute_above: 0.1,
            complement_below: -0.1,
        }
    }
}

impl CrossPolicy {
    pub fn classify(&self, coefficient: f64) -> CrossRelation {
        if coefficient > self.substitute_above {
            CrossRelation::Substitutes
        } else if coefficient < self.complement_below {
            CrossRelation::Complements
        } else {
            CrossRelation::Unrelated
        }
    }
}
