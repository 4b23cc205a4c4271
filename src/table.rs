//! The transaction table: the core's sole interchange format with its
//! collaborators.
//!
//! Collaborators hand the core a polars `DataFrame` with the master-table
//! schema (one row per order line item); the core converts it to a typed
//! [`TransactionTable`] at the boundary and computes on that. The core never
//! opens a connection or reads configuration — whoever produced the frame
//! owns those concerns.

use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};

/// Fallback category label when `product_category_name_english` is missing.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// One order line item. `(order_id, order_item_id)` is the natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub order_id: String,
    pub order_item_id: i64,
    pub product_id: String,
    /// Unit price, strictly positive. Rows violating this are dropped at load.
    pub price: f64,
    pub freight_value: f64,
    /// Per-order customer identifier.
    pub customer_id: String,
    pub purchased_at: NaiveDateTime,
    /// Stable identifier shared across a customer's orders.
    pub customer_unique_id: String,
    pub customer_zip_code_prefix: Option<i64>,
    pub customer_city: Option<String>,
    pub customer_state: Option<String>,
    pub product_category: String,
    /// Assigned by the segmentation engine; absent until it runs.
    pub customer_segment: Option<u32>,
}

/// In-memory transaction table the analytics functions operate on.
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    pub rows: Vec<Transaction>,
}

impl From<Vec<Transaction>> for TransactionTable {
    fn from(rows: Vec<Transaction>) -> Self {
        Self { rows }
    }
}

impl TransactionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.rows.iter()
    }

    /// Distinct category names, sorted.
    pub fn categories(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|t| t.product_category.as_str()).collect();
        set.into_iter().map(str::to_owned).collect()
    }

    /// Unit prices for a category slice (`None` = whole table).
    pub fn prices(&self, category: Option<&str>) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|t| category.map_or(true, |c| t.product_category == c))
            .map(|t| t.price)
            .collect()
    }

    /// Load a transaction CSV through the polars boundary.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let df = CsvReader::from_path(path.as_ref())?
            .has_header(true)
            .finish()?;
        Self::from_dataframe(&df)
    }

    /// Convert a master-table `DataFrame` into typed rows.
    ///
    /// Rows with a non-positive price are excluded (the schema requires
    /// `price > 0`); a missing category becomes [`UNKNOWN_CATEGORY`]. Nulls
    /// in any other required column are an error.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let order_id = df.column("order_id")?.utf8()?;
        let order_item_id_s = df.column("order_item_id")?.cast(&DataType::Int64)?;
        let order_item_id = order_item_id_s.i64()?;
        let product_id = df.column("product_id")?.utf8()?;
        let price_s = df.column("price")?.cast(&DataType::Float64)?;
        let price = price_s.f64()?;
        let freight_s = df.column("freight_value")?.cast(&DataType::Float64)?;
        let freight = freight_s.f64()?;
        let customer_id = df.column("customer_id")?.utf8()?;
        let purchased_at = df.column("order_purchase_timestamp")?.utf8()?;
        let customer_unique_id = df.column("customer_unique_id")?.utf8()?;
        let zip_s = df.column("customer_zip_code_prefix")?.cast(&DataType::Int64)?;
        let zip = zip_s.i64()?;
        let city = df.column("customer_city")?.utf8()?;
        let state = df.column("customer_state")?.utf8()?;
        let category = df.column("product_category_name_english")?.utf8()?;
        let segment_s = match df.column("customer_segment") {
            Ok(s) => Some(s.cast(&DataType::UInt32)?),
            Err(_) => None,
        };
        let segment = segment_s.as_ref().map(|s| s.u32()).transpose()?;

        let mut rows = Vec::with_capacity(df.height());
        let mut dropped = 0usize;
        for i in 0..df.height() {
            let p = required(price.get(i), "price", i)?;
            if p <= 0.0 {
                dropped += 1;
                continue;
            }
            rows.push(Transaction {
                order_id: required(order_id.get(i), "order_id", i)?.to_owned(),
                order_item_id: required(order_item_id.get(i), "order_item_id", i)?,
                product_id: required(product_id.get(i), "product_id", i)?.to_owned(),
                price: p,
                freight_value: freight.get(i).unwrap_or(0.0),
                customer_id: required(customer_id.get(i), "customer_id", i)?.to_owned(),
                purchased_at: parse_timestamp(required(
                    purchased_at.get(i),
                    "order_purchase_timestamp",
                    i,
                )?)?,
                customer_unique_id: required(customer_unique_id.get(i), "customer_unique_id", i)?
                    .to_owned(),
                customer_zip_code_prefix: zip.get(i),
                customer_city: city.get(i).map(str::to_owned),
                customer_state: state.get(i).map(str::to_owned),
                product_category: category.get(i).unwrap_or(UNKNOWN_CATEGORY).to_owned(),
                customer_segment: segment.and_then(|s| s.get(i)),
            });
        }
        if dropped > 0 {
            tracing::debug!(dropped, "excluded rows with non-positive price");
        }
        Ok(Self { rows })
    }

    /// Render the table back into the boundary schema.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let n = self.rows.len();
        let mut order_id = Vec::with_capacity(n);
        let mut order_item_id = Vec::with_capacity(n);
        let mut product_id = Vec::with_capacity(n);
        let mut price = Vec::with_capacity(n);
        let mut freight = Vec::with_capacity(n);
        let mut customer_id = Vec::with_capacity(n);
        let mut purchased_at = Vec::with_capacity(n);
        let mut customer_unique_id = Vec::with_capacity(n);
        let mut zip = Vec::with_capacity(n);
        let mut city = Vec::with_capacity(n);
        let mut state = Vec::with_capacity(n);
        let mut category = Vec::with_capacity(n);
        let mut segment: Vec<Option<u32>> = Vec::with_capacity(n);
        for t in &self.rows {
            order_id.push(t.order_id.clone());
            order_item_id.push(t.order_item_id);
            product_id.push(t.product_id.clone());
            price.push(t.price);
            freight.push(t.freight_value);
            customer_id.push(t.customer_id.clone());
            purchased_at.push(t.purchased_at.format("%Y-%m-%d %H:%M:%S").to_string());
            customer_unique_id.push(t.customer_unique_id.clone());
            zip.push(t.customer_zip_code_prefix);
            city.push(t.customer_city.clone());
            state.push(t.customer_state.clone());
            category.push(t.product_category.clone());
            segment.push(t.customer_segment);
        }
        Ok(DataFrame::new(vec![
            Series::new("order_id", order_id),
            Series::new("order_item_id", order_item_id),
            Series::new("product_id", product_id),
            Series::new("price", price),
            Series::new("freight_value", freight),
            Series::new("customer_id", customer_id),
            Series::new("order_purchase_timestamp", purchased_at),
            Series::new("customer_unique_id", customer_unique_id),
            Series::new("customer_zip_code_prefix", zip),
            Series::new("customer_city", city),
            Series::new("customer_state", state),
            Series::new("product_category_name_english", category),
            Series::new("customer_segment", segment),
        ])?)
    }

    /// Persist the (optionally segment-enriched) table to a CSV sink.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    }
}

fn required<T>(value: Option<T>, column: &'static str, row: usize) -> Result<T> {
    value.ok_or(Error::NullValue { column, row })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    Err(Error::Timestamp(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(order: &str, customer: &str, price: f64, ts: &str) -> Transaction {
        Transaction {
            order_id: order.to_owned(),
            order_item_id: 1,
            product_id: "p1".to_owned(),
            price,
            freight_value: 0.0,
            customer_id: format!("{customer}-order"),
            purchased_at: parse_timestamp(ts).unwrap(),
            customer_unique_id: customer.to_owned(),
            customer_zip_code_prefix: Some(13566),
            customer_city: Some("sao carlos".to_owned()),
            customer_state: Some("SP".to_owned()),
            product_category: "toys".to_owned(),
            customer_segment: None,
        }
    }

    #[test]
    fn parses_both_timestamp_formats() {
        assert!(parse_timestamp("2017-10-02 10:56:33").is_ok());
        assert!(parse_timestamp("2017-10-02T10:56:33").is_ok());
        assert!(matches!(
            parse_timestamp("10/02/2017"),
            Err(Error::Timestamp(_))
        ));
    }

    #[test]
    fn dataframe_round_trip_keeps_rows_and_segments() {
        let mut table = TransactionTable::from(vec![
            tx("o1", "c1", 10.0, "2017-10-02 10:56:33"),
            tx("o2", "c2", 20.0, "2017-11-02 10:56:33"),
        ]);
        table.rows[0].customer_segment = Some(2);

        let df = table.to_dataframe().unwrap();
        let back = TransactionTable::from_dataframe(&df).unwrap();
        assert_eq!(back.rows, table.rows);
    }

    #[test]
    fn missing_segment_column_is_tolerated() {
        let table = TransactionTable::from(vec![tx("o1", "c1", 10.0, "2017-10-02 10:56:33")]);
        let df = table.to_dataframe().unwrap().drop("customer_segment").unwrap();
        let back = TransactionTable::from_dataframe(&df).unwrap();
        assert_eq!(back.rows[0].customer_segment, None);
    }

    #[test]
    fn categories_are_sorted_and_distinct() {
        let mut rows = vec![
            tx("o1", "c1", 10.0, "2017-10-02 10:56:33"),
            tx("o2", "c2", 20.0, "2017-10-03 10:56:33"),
            tx("o3", "c3", 30.0, "2017-10-04 10:56:33"),
        ];
        rows[1].product_category = "bed_bath_table".to_owned();
        rows[2].product_category = "toys".to_owned();
        let table = TransactionTable::from(rows);
        assert_eq!(table.categories(), vec!["bed_bath_table", "toys"]);
    }
}
