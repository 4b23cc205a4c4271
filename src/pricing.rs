//! Revenue-maximizing price search over a fitted elasticity model.

use crate::elasticity::ElasticityModel;
use crate::error::{Error, Result};

pub const DEFAULT_SWEEP_STEPS: usize = 100;

/// Best price found by the sweep and the revenue projected at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRecommendation {
    pub price: f64,
    pub revenue: f64,
}

/// Sweep `steps` evenly spaced prices across `[price_low, price_high]` and
/// return the revenue argmax under the model.
///
/// The caller picks the range — see [`PriceBandPolicy`] for the usual one.
/// A non-positive or inverted range, or fewer than two steps, is an invalid
/// request. If the model predicts no finite revenue anywhere in the range
/// the sweep reports `Ok(None)` instead of inventing a price.
pub fn maximize_revenue(
    model: &ElasticityModel,
    price_low: f64,
    price_high: f64,
    steps: usize,
) -> Result<Option<PriceRecommendation>> {
    if !(price_low > 0.0 && price_high.is_finite()) {
        return Err(Error::InvalidRequest(format!(
            "price range must be positive, got [{price_low}, {price_high}]"
        )));
    }
    if price_high < price_low {
        return Err(Error::InvalidRequest(format!(
            "price range is inverted: [{price_low}, {price_high}]"
        )));
    }
    if steps < 2 {
        return Err(Error::InvalidRequest(format!(
            "sweep needs at least 2 steps, got {steps}"
        )));
    }

    let span = price_high - price_low;
    let mut best: Option<PriceRecommendation> = None;
    for i in 0..steps {
        let price = price_low + span * i as f64 / (steps - 1) as f64;
        let revenue = price * model.predict_demand(price);
        if !revenue.is_finite() {
            continue;
        }
        if best.map_or(true, |b| revenue > b.revenue) {
            best = Some(PriceRecommendation { price, revenue });
        }
    }

    if best.is_none() {
        tracing::warn!(
            price_low,
            price_high,
            "model produced no finite revenue anywhere in the sweep range"
        );
    }
    Ok(best)
}

/// Policy for deriving a "realistic" sweep range from historical prices:
/// inner-quartile band, widened to mean ± `fallback_spread` when the
/// quartiles collapse. Empirical defaults, tune per domain.
#[derive(Debug, Clone, Copy)]
pub struct PriceBandPolicy {
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub fallback_spread: f64,
}

impl Default for PriceBandPolicy {
    fn default() -> Self {
        Self {
            lower_quantile: 0.25,
            upper_quantile: 0.75,
            fallback_spread: 0.3,
        }
    }
}

impl PriceBandPolicy {
    /// Sweep range for a slice's historical prices; `None` when the slice is
    /// empty or yields no positive band.
    pub fn realistic_range(&self, prices: &[f64]) -> Option<(f64, f64)> {
        if prices.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let low = quantile(&sorted, self.lower_quantile);
        let high = quantile(&sorted, self.upper_quantile);
        if low > 0.0 && high > low {
            return Some((low, high));
        }

        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        if mean > 0.0 {
            Some((mean * (1.0 - self.fallback_spread), mean * (1.0 + self.fallback_spread)))
        } else {
            None
        }
    }
}

/// Linear-interpolation quantile on a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let weight = position - below as f64;
    sorted[below] * (1.0 - weight) + sorted[above] * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn model(intercept: f64, slope: f64) -> ElasticityModel {
        ElasticityModel { intercept, slope }
    }

    #[test]
    fn rejects_bad_ranges_and_step_counts() {
        let m = model(5.0, -1.2);
        assert!(maximize_revenue(&m, 0.0, 10.0, 100).is_err());
        assert!(maximize_revenue(&m, -5.0, 10.0, 100).is_err());
        assert!(maximize_revenue(&m, 10.0, 5.0, 100).is_err());
        assert!(maximize_revenue(&m, 1.0, 10.0, 1).is_err());
    }

    #[test]
    fn elastic_demand_pushes_the_optimum_to_the_low_end() {
        // Revenue = e^5 * p^(1-2) is strictly decreasing, so the analytic
        // optimum is the range's low endpoint.
        let m = model(5.0, -2.0);
        let best = maximize_revenue(&m, 10.0, 50.0, 100).unwrap().unwrap();
        let step = 40.0 / 99.0;
        assert!((best.price - 10.0).abs() <= step + 1e-9);
    }

    #[test]
    fn inelastic_demand_pushes_the_optimum_to_the_high_end() {
        let m = model(5.0, -0.5);
        let best = maximize_revenue(&m, 10.0, 50.0, 100).unwrap().unwrap();
        let step = 40.0 / 99.0;
        assert!((best.price - 50.0).abs() <= step + 1e-9);
    }

    #[test]
    fn unstable_model_yields_no_recommendation() {
        let m = model(f64::NAN, -1.0);
        assert!(maximize_revenue(&m, 10.0, 50.0, 100).unwrap().is_none());
    }

    #[test]
    fn realistic_range_uses_the_inner_quartiles() {
        let prices: Vec<f64> = (1..=100).map(f64::from).collect();
        let (low, high) = PriceBandPolicy::default().realistic_range(&prices).unwrap();
        assert_abs_diff_eq!(low, 25.75, epsilon = 1e-9);
        assert_abs_diff_eq!(high, 75.25, epsilon = 1e-9);
    }

    #[test]
    fn flat_prices_fall_back_to_a_mean_band() {
        let prices = vec![10.0; 8];
        let (low, high) = PriceBandPolicy::default().realistic_range(&prices).unwrap();
        assert_abs_diff_eq!(low, 7.0, epsilon = 1e-9);
        assert_abs_diff_eq!(high, 13.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_history_yields_no_range() {
        assert!(PriceBandPolicy::default().realistic_range(&[]).is_none());
    }
}
