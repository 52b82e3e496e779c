//! Seeded K-means (Lloyd's algorithm with k-means++ seeding).
//!
//! Every restart draws from one `ChaCha8Rng` stream seeded with
//! `random_state`, so a fit is a pure function of its input and settings.

use crate::error::ClusterError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Dense row-major matrix of standardized features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Builds a matrix from equally long columns.
    pub fn from_columns(columns: &[Vec<f64>]) -> Self {
        let cols = columns.len();
        let rows = columns.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for column in columns {
                data.push(column[r]);
            }
        }
        FeatureMatrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, c)).collect()
    }
}

/// Outcome of the best restart.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances of rows to their assigned centroid.
    pub inertia: f64,
    pub n_iter: usize,
}

#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    random_state: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        KMeans {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            random_state: 0,
        }
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Runs `n_init` restarts and keeps the one with the lowest inertia.
    /// Ties keep the earlier restart.
    pub fn fit(&self, data: &FeatureMatrix) -> Result<KMeansFit, ClusterError> {
        let k = self.n_clusters;
        if k == 0 {
            return Err(ClusterError::InvalidClusterCount { k });
        }
        if data.rows() < k {
            return Err(ClusterError::TooFewRows {
                rows: data.rows(),
                k,
            });
        }

        let tol = self.tol * mean_variance(data);
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut best: Option<KMeansFit> = None;

        for _ in 0..self.n_init {
            let fit = self.run_once(data, tol, &mut rng);
            let better = best.as_ref().map_or(true, |b| fit.inertia < b.inertia);
            if better {
                best = Some(fit);
            }
        }

        // n_init >= 1, so a restart always ran
        best.ok_or(ClusterError::InvalidClusterCount { k })
    }

    fn run_once(&self, data: &FeatureMatrix, tol: f64, rng: &mut ChaCha8Rng) -> KMeansFit {
        let mut centroids = init_plus_plus(data, self.n_clusters, rng);
        let mut labels = vec![0; data.rows()];
        let mut n_iter = 0;

        for iter in 1..=self.max_iter {
            n_iter = iter;
            assign(data, &centroids, &mut labels);
            let updated = update_centroids(data, &labels, &centroids);
            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| squared_distance(old, new))
                .sum();
            centroids = updated;
            if shift <= tol {
                break;
            }
        }

        // Final assignment against the converged centroids.
        let inertia = assign(data, &centroids, &mut labels);
        KMeansFit {
            labels,
            centroids,
            inertia,
            n_iter,
        }
    }
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index and squared distance of the nearest centroid; ties pick the lowest index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Writes the nearest-centroid label for every row and returns the inertia.
fn assign(data: &FeatureMatrix, centroids: &[Vec<f64>], labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (r, label) in labels.iter_mut().enumerate() {
        let (idx, d) = nearest(data.row(r), centroids);
        *label = idx;
        inertia += d;
    }
    inertia
}

/// Mean of each cluster. An empty cluster is moved onto the row farthest
/// from its current centroid so that k clusters survive.
fn update_centroids(data: &FeatureMatrix, labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = previous.len();
    let mut sums = vec![vec![0.0; data.cols()]; k];
    let mut counts = vec![0usize; k];

    for (r, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(data.row(r)) {
            *s += v;
        }
    }

    let mut taken = Vec::new();
    for c in 0..k {
        if counts[c] > 0 {
            let n = counts[c] as f64;
            sums[c].iter_mut().for_each(|s| *s /= n);
        } else {
            let far = (0..data.rows())
                .filter(|r| !taken.contains(r))
                .max_by(|&a, &b| {
                    let da = squared_distance(data.row(a), &previous[labels[a]]);
                    let db = squared_distance(data.row(b), &previous[labels[b]]);
                    // Prefer the lower row index on equal distance.
                    da.total_cmp(&db).then(b.cmp(&a))
                })
                .unwrap_or(0);
            taken.push(far);
            sums[c] = data.row(far).to_vec();
        }
    }
    sums
}

/// k-means++ seeding: first centre uniformly, the rest with probability
/// proportional to squared distance from the nearest chosen centre.
fn init_plus_plus(data: &FeatureMatrix, k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = data.rows();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data.row(rng.gen_range(0..n)).to_vec());

    let mut dist: Vec<f64> = (0..n)
        .map(|r| squared_distance(data.row(r), &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dist.iter().sum();
        let pick = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = n - 1;
            for (r, d) in dist.iter().enumerate() {
                acc += d;
                if acc > target {
                    chosen = r;
                    break;
                }
            }
            chosen
        } else {
            // every row coincides with a chosen centre
            rng.gen_range(0..n)
        };

        let centre = data.row(pick).to_vec();
        for (r, d) in dist.iter_mut().enumerate() {
            *d = d.min(squared_distance(data.row(r), &centre));
        }
        centroids.push(centre);
    }
    centroids
}

/// Average per-column variance, used to scale the convergence tolerance.
fn mean_variance(data: &FeatureMatrix) -> f64 {
    if data.rows() == 0 || data.cols() == 0 {
        return 0.0;
    }
    let n = data.rows() as f64;
    let total: f64 = (0..data.cols())
        .map(|c| {
            let col = data.column(c);
            let mean = col.iter().sum::<f64>() / n;
            col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
        })
        .sum();
    total / data.cols() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> FeatureMatrix {
        FeatureMatrix::from_columns(&[
            vec![0.0, 0.1, 0.2, 10.0, 10.1, 10.2],
            vec![0.0, 0.1, 0.2, 10.0, 10.1, 10.2],
        ])
    }

    #[test]
    fn test_matrix_layout() {
        let m = FeatureMatrix::from_columns(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.row(1), &[2.0, 4.0]);
        assert_eq!(m.column(1), vec![3.0, 4.0]);
    }

    #[test]
    fn test_separates_blobs() {
        let fit = KMeans::new(2).with_random_state(42).fit(&two_blobs()).unwrap();

        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.inertia < 0.1);
    }

    #[test]
    fn test_labels_in_range_and_nearest() {
        let data = two_blobs();
        let fit = KMeans::new(3).with_random_state(7).fit(&data).unwrap();

        for (r, &label) in fit.labels.iter().enumerate() {
            assert!(label < 3);
            let assigned = squared_distance(data.row(r), &fit.centroids[label]);
            for c in &fit.centroids {
                assert!(assigned <= squared_distance(data.row(r), c) + 1e-12);
            }
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let data = two_blobs();
        let a = KMeans::new(2).with_random_state(42).fit(&data).unwrap();
        let b = KMeans::new(2).with_random_state(42).fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_equals_rows_gives_zero_inertia() {
        let data = two_blobs();
        let fit = KMeans::new(6).with_random_state(1).fit(&data).unwrap();
        assert!(fit.inertia.abs() < 1e-12);
        let mut labels = fit.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 6);
    }

    #[test]
    fn test_identical_rows() {
        let data = FeatureMatrix::from_columns(&[vec![0.0; 5]]);
        let fit = KMeans::new(2).with_random_state(42).fit(&data).unwrap();
        assert_eq!(fit.inertia, 0.0);
        assert!(fit.labels.iter().all(|&l| l < 2));
    }

    #[test]
    fn test_rejects_bad_k() {
        let data = two_blobs();
        assert_eq!(
            KMeans::new(0).fit(&data),
            Err(ClusterError::InvalidClusterCount { k: 0 })
        );
        assert_eq!(
            KMeans::new(7).fit(&data),
            Err(ClusterError::TooFewRows { rows: 6, k: 7 })
        );
    }
}
