//! Customer segmentation: seeded k-means over log-scaled RFM features.

use linfa::prelude::*;
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::features::{build_rfm_matrix, RfmMatrix, StandardScaler};
use crate::table::TransactionTable;

pub const DEFAULT_NUM_CLUSTERS: usize = 4;
pub const DEFAULT_SEED: u64 = 42;

const MAX_ITERATIONS: u64 = 300;
const TOLERANCE: f64 = 1e-4;
const N_RUNS: usize = 10;

/// Display names applied by monetary rank when four segments are requested.
/// Cluster indices themselves carry no meaning; ranks do.
const RANK_NAMES: [&str; 4] = ["Best Customers", "Loyal Customers", "Promising", "At Risk"];

/// A fitted segmentation run.
///
/// Cluster indices are stable only within this run: k-means is seeded, so an
/// identical rerun reproduces them, but a different seed or input may permute
/// them freely. Anything rank-dependent goes through [`monetary_rank`].
///
/// [`monetary_rank`]: Segmentation::monetary_rank
pub struct Segmentation {
    pub num_clusters: usize,
    pub seed: u64,
    /// One id per row of `labels`, sorted ascending.
    pub customer_ids: Vec<String>,
    pub labels: Array1<usize>,
    /// Centroids in the standardized feature space, shape (k, 3).
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares of the fit.
    pub inertia: f64,
    raw_rfm: Array2<f64>,
    scaler: StandardScaler,
    kmeans: KMeans<f64, L2Dist>,
}

/// Per-segment roll-up for reporting and rank-based naming.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: u32,
    pub name: String,
    pub customers: usize,
    pub avg_recency: f64,
    pub avg_frequency: f64,
    pub avg_monetary: f64,
}

/// Cluster customers into `num_clusters` behavioral segments.
///
/// Fails with [`Error::InvalidRequest`] for a zero cluster count and
/// [`Error::InsufficientData`] when fewer distinct customers exist than
/// clusters requested; there is no silent fallback.
pub fn segment(table: &TransactionTable, num_clusters: usize, seed: u64) -> Result<Segmentation> {
    if num_clusters == 0 {
        return Err(Error::InvalidRequest(
            "num_clusters must be positive".to_owned(),
        ));
    }

    let matrix = build_rfm_matrix(table)?;
    let n_customers = matrix.customer_ids.len();
    if n_customers < num_clusters {
        return Err(Error::InsufficientData {
            context: "clustering",
            needed: num_clusters,
            actual: n_customers,
        });
    }

    let RfmMatrix {
        customer_ids,
        features,
        raw,
        scaler,
    } = matrix;

    let rng = Xoshiro256Plus::seed_from_u64(seed);
    let dataset = Dataset::new(features.clone(), Array1::<usize>::zeros(n_customers));
    let kmeans = KMeans::params_with(num_clusters, rng, L2Dist)
        .max_n_iterations(MAX_ITERATIONS)
        .tolerance(TOLERANCE)
        .n_runs(N_RUNS)
        .init_method(KMeansInit::KMeansPlusPlus)
        .fit(&dataset)?;

    let labels: Array1<usize> = kmeans.predict(&features);
    let centroids = kmeans.centroids().clone();
    let inertia = within_cluster_ss(&features, &labels, &centroids);

    Ok(Segmentation {
        num_clusters,
        seed,
        customer_ids,
        labels,
        centroids,
        inertia,
        raw_rfm: raw,
        scaler,
        kmeans,
    })
}

impl Segmentation {
    /// Customer unique id → segment index.
    pub fn assignments(&self) -> BTreeMap<String, u32> {
        self.customer_ids
            .iter()
            .zip(self.labels.iter())
            .map(|(id, &label)| (id.clone(), label as u32))
            .collect()
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.num_clusters];
        for &label in self.labels.iter() {
            sizes[label] += 1;
        }
        sizes
    }

    /// Segment for a new customer given raw (recency, frequency, monetary).
    pub fn predict(&self, rfm: [f64; 3]) -> Result<usize> {
        let transformed = Array2::from_shape_vec((1, 3), rfm.to_vec())?.mapv(f64::ln_1p);
        let scaled = self.scaler.transform(&transformed);
        let label: Array1<usize> = self.kmeans.predict(&scaled);
        Ok(label[0])
    }

    /// Rank of each cluster by mean raw monetary, descending: `rank[c] == 0`
    /// means cluster `c` holds the highest-spending customers of this run.
    pub fn monetary_rank(&self) -> Vec<usize> {
        let means = self.mean_raw_by_cluster(2);
        let mut order: Vec<usize> = (0..self.num_clusters).collect();
        order.sort_by(|&a, &b| means[b].partial_cmp(&means[a]).unwrap_or(std::cmp::Ordering::Equal));
        let mut rank = vec![0; self.num_clusters];
        for (r, &cluster) in order.iter().enumerate() {
            rank[cluster] = r;
        }
        rank
    }

    /// Display name per cluster index, assigned by monetary rank rather than
    /// by raw index. A display-layer convention, not a model guarantee.
    pub fn segment_names(&self) -> Vec<String> {
        let rank = self.monetary_rank();
        (0..self.num_clusters)
            .map(|c| {
                if self.num_clusters == RANK_NAMES.len() {
                    RANK_NAMES[rank[c]].to_owned()
                } else {
                    format!("Tier {}", rank[c] + 1)
                }
            })
            .collect()
    }

    /// Per-segment statistics over the raw RFM values, ordered by rank.
    pub fn summaries(&self) -> Vec<SegmentSummary> {
        let names = self.segment_names();
        let sizes = self.cluster_sizes();
        let mut out: Vec<SegmentSummary> = (0..self.num_clusters)
            .map(|c| SegmentSummary {
                segment: c as u32,
                name: names[c].clone(),
                customers: sizes[c],
                avg_recency: self.mean_raw_by_cluster(0)[c],
                avg_frequency: self.mean_raw_by_cluster(1)[c],
                avg_monetary: self.mean_raw_by_cluster(2)[c],
            })
            .collect();
        let rank = self.monetary_rank();
        out.sort_by_key(|s| rank[s.segment as usize]);
        out
    }

    fn mean_raw_by_cluster(&self, feature: usize) -> Vec<f64> {
        let mut sums = vec![0.0; self.num_clusters];
        let mut counts = vec![0usize; self.num_clusters];
        for (i, &label) in self.labels.iter().enumerate() {
            sums[label] += self.raw_rfm[[i, feature]];
            counts[label] += 1;
        }
        sums.iter()
            .zip(&counts)
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect()
    }
}

/// Write segment labels back onto the transaction rows, left-join style:
/// customers missing from the assignment keep `None`.
pub fn apply_segments(table: &mut TransactionTable, assignments: &BTreeMap<String, u32>) {
    for t in &mut table.rows {
        t.customer_segment = assignments.get(&t.customer_unique_id).copied();
    }
}

fn within_cluster_ss(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    centroids: &Array2<f64>,
) -> f64 {
    let mut total = 0.0;
    for (i, &cluster) in labels.iter().enumerate() {
        let point = features.row(i);
        let centroid = centroids.row(cluster);
        total += point
            .iter()
            .zip(centroid.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>();
    }
    total
}
