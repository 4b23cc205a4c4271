//! Feature engineering on the transaction table.
//!
//! Everything the estimators consume is derived here: per-customer RFM
//! profiles for segmentation, the price/demand curve for own-price
//! elasticity, weekly series for cross-price elasticity, and daily revenue
//! for forecasting. Recomputed on every call; nothing is cached or persisted.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use ndarray::{Array1, Array2, Axis};
use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::table::TransactionTable;

/// Raw Recency/Frequency/Monetary values for one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct RfmRecord {
    pub customer_unique_id: String,
    /// Whole days between the customer's last purchase and the snapshot date.
    pub recency: f64,
    /// Count of distinct orders.
    pub frequency: f64,
    /// Sum of unit prices across all line items (freight excluded).
    pub monetary: f64,
}

/// RFM feature matrix ready for clustering.
#[derive(Debug, Clone)]
pub struct RfmMatrix {
    /// One id per row, sorted ascending for run-to-run determinism.
    pub customer_ids: Vec<String>,
    /// log1p-transformed, standardized features, shape (n_customers, 3).
    pub features: Array2<f64>,
    /// Raw R/F/M values before any transform.
    pub raw: Array2<f64>,
    pub scaler: StandardScaler,
}

/// Reference date for recency: one day past the latest purchase in the table.
pub fn snapshot_date(table: &TransactionTable) -> Option<NaiveDateTime> {
    table
        .iter()
        .map(|t| t.purchased_at)
        .max()
        .map(|ts| ts + Duration::days(1))
}

/// Per-customer RFM profiles, sorted by customer unique id.
///
/// Every customer present in the input appears in the output; a single-order
/// customer has frequency 1 and recency measured from that one order.
pub fn rfm_profiles(table: &TransactionTable) -> Vec<RfmRecord> {
    let Some(snapshot) = snapshot_date(table) else {
        return Vec::new();
    };

    struct Acc {
        last_purchase: NaiveDateTime,
        orders: HashSet<String>,
        monetary: f64,
    }

    let mut by_customer: BTreeMap<&str, Acc> = BTreeMap::new();
    for t in table.iter() {
        let acc = by_customer
            .entry(t.customer_unique_id.as_str())
            .or_insert_with(|| Acc {
                last_purchase: t.purchased_at,
                orders: HashSet::new(),
                monetary: 0.0,
            });
        acc.last_purchase = acc.last_purchase.max(t.purchased_at);
        acc.orders.insert(t.order_id.clone());
        acc.monetary += t.price;
    }

    by_customer
        .into_iter()
        .map(|(id, acc)| RfmRecord {
            customer_unique_id: id.to_owned(),
            recency: (snapshot - acc.last_purchase).num_days() as f64,
            frequency: acc.orders.len() as f64,
            monetary: acc.monetary,
        })
        .collect()
}

/// Build the clustering matrix: log1p to compress skew, then standardize.
pub fn build_rfm_matrix(table: &TransactionTable) -> Result<RfmMatrix> {
    let profiles = rfm_profiles(table);
    let n = profiles.len();
    let mut customer_ids = Vec::with_capacity(n);
    let mut raw_data = Vec::with_capacity(n * 3);
    for p in &profiles {
        customer_ids.push(p.customer_unique_id.clone());
        raw_data.extend_from_slice(&[p.recency, p.frequency, p.monetary]);
    }
    let raw = Array2::from_shape_vec((n, 3), raw_data)?;

    // log(1 + x) keeps zero recency/monetary finite where a raw log would not.
    let transformed = raw.mapv(f64::ln_1p);
    let scaler = StandardScaler::fit(&transformed);
    let features = scaler.transform(&transformed);

    Ok(RfmMatrix {
        customer_ids,
        features,
        raw,
        scaler,
    })
}

/// Zero-mean unit-variance column scaler fitted on the training matrix.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let means = data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(data.ncols()));
        let mut stds = data.std_axis(Axis(0), 0.0);
        // Constant columns pass through unscaled.
        stds.mapv_inplace(|s| if s > 0.0 { s } else { 1.0 });
        Self { means, stds }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut out = data.clone();
        for mut row in out.rows_mut() {
            row -= &self.means;
            row /= &self.stds;
        }
        out
    }
}

/// Aggregate a slice to (unit price, demand = line-item count at that price),
/// sorted by price. `None` means the whole table.
pub fn price_demand_curve(table: &TransactionTable, category: Option<&str>) -> Vec<(f64, u64)> {
    // Positive f64 bit patterns order the same as the values, so the bits
    // make a usable exact-equality grouping key.
    let mut by_price: BTreeMap<u64, u64> = BTreeMap::new();
    for t in table.iter() {
        if category.map_or(true, |c| t.product_category == c) {
            *by_price.entry(t.price.to_bits()).or_insert(0) += 1;
        }
    }
    by_price
        .into_iter()
        .map(|(bits, count)| (f64::from_bits(bits), count))
        .collect()
}

/// Weekly line-item counts for a category, keyed by Sunday-ending week.
pub fn weekly_demand(table: &TransactionTable, category: &str) -> BTreeMap<NaiveDate, u64> {
    let mut weeks = BTreeMap::new();
    for t in table.iter() {
        if t.product_category == category {
            *weeks.entry(week_ending(t.purchased_at.date())).or_insert(0) += 1;
        }
    }
    weeks
}

/// Weekly mean unit price for a category, keyed by Sunday-ending week.
pub fn weekly_mean_price(table: &TransactionTable, category: &str) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
    for t in table.iter() {
        if t.product_category == category {
            let e = sums.entry(week_ending(t.purchased_at.date())).or_insert((0.0, 0));
            e.0 += t.price;
            e.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(week, (sum, count))| (week, sum / count as f64))
        .collect()
}

/// Total revenue per calendar day for a slice, sorted by date. Days with no
/// sales are simply absent, not zero-filled.
pub fn daily_revenue(table: &TransactionTable, category: Option<&str>) -> Vec<(NaiveDate, f64)> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for t in table.iter() {
        if category.map_or(true, |c| t.product_category == c) {
            *days.entry(t.purchased_at.date()).or_insert(0.0) += t.price;
        }
    }
    days.into_iter().collect()
}

/// The Sunday on or after `date`, matching a weekly resample with
/// Sunday-ending buckets.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
    date + Duration::days(to_sunday)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Transaction;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn tx(order: &str, customer: &str, price: f64, date: &str) -> Transaction {
        Transaction {
            order_id: order.to_owned(),
            order_item_id: 1,
            product_id: "p".to_owned(),
            price,
            freight_value: 2.5,
            customer_id: format!("{customer}-o"),
            purchased_at: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            customer_unique_id: customer.to_owned(),
            customer_zip_code_prefix: None,
            customer_city: None,
            customer_state: None,
            product_category: "toys".to_owned(),
            customer_segment: None,
        }
    }

    #[test]
    fn rfm_counts_distinct_orders_and_sums_price_only() {
        let table = TransactionTable::from(vec![
            tx("o1", "c1", 10.0, "2018-01-01"),
            tx("o1", "c1", 5.0, "2018-01-01"),
            tx("o2", "c1", 20.0, "2018-02-01"),
            tx("o3", "c2", 7.0, "2018-02-10"),
        ]);
        let profiles = rfm_profiles(&table);
        assert_eq!(profiles.len(), 2);

        let c1 = &profiles[0];
        assert_eq!(c1.customer_unique_id, "c1");
        assert_abs_diff_eq!(c1.frequency, 2.0);
        // Freight is excluded from monetary.
        assert_abs_diff_eq!(c1.monetary, 35.0);
    }

    #[test]
    fn recency_is_strictly_smaller_for_more_recent_purchases() {
        let table = TransactionTable::from(vec![
            tx("o1", "older", 10.0, "2018-01-01"),
            tx("o2", "newer", 10.0, "2018-03-01"),
        ]);
        let profiles = rfm_profiles(&table);
        let older = profiles.iter().find(|p| p.customer_unique_id == "older").unwrap();
        let newer = profiles.iter().find(|p| p.customer_unique_id == "newer").unwrap();
        assert!(newer.recency < older.recency);
        // Snapshot is one day past the latest purchase.
        assert_abs_diff_eq!(newer.recency, 1.0);
    }

    #[test]
    fn single_order_customer_has_frequency_one() {
        let table = TransactionTable::from(vec![tx("o1", "c1", 10.0, "2018-01-01")]);
        let profiles = rfm_profiles(&table);
        assert_abs_diff_eq!(profiles[0].frequency, 1.0);
        assert_abs_diff_eq!(profiles[0].recency, 1.0);
    }

    #[test]
    fn scaler_produces_zero_mean_unit_variance() {
        let data =
            Array2::from_shape_vec((4, 2), vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0])
                .unwrap();
        let scaler = StandardScaler::fit(&data);
        let scaled = scaler.transform(&data);
        for col in scaled.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(col.std(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn price_demand_curve_groups_exact_prices() {
        let table = TransactionTable::from(vec![
            tx("o1", "c1", 9.99, "2018-01-01"),
            tx("o2", "c2", 9.99, "2018-01-02"),
            tx("o3", "c3", 19.99, "2018-01-03"),
        ]);
        let curve = price_demand_curve(&table, None);
        assert_eq!(curve, vec![(9.99, 2), (19.99, 1)]);
    }

    #[test]
    fn week_ending_lands_on_sunday() {
        // 2018-01-01 was a Monday; its bucket ends Sunday 2018-01-07.
        let monday = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2018, 1, 7).unwrap();
        assert_eq!(week_ending(monday), sunday);
        assert_eq!(week_ending(sunday), sunday);
    }

    #[test]
    fn daily_revenue_skips_empty_days() {
        let table = TransactionTable::from(vec![
            tx("o1", "c1", 10.0, "2018-01-01"),
            tx("o2", "c2", 15.0, "2018-01-01"),
            tx("o3", "c3", 30.0, "2018-01-05"),
        ]);
        let series = daily_revenue(&table, None);
        assert_eq!(series.len(), 2);
        assert_abs_diff_eq!(series[0].1, 25.0);
        assert_abs_diff_eq!(series[1].1, 30.0);
    }
}
