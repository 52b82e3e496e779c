//! Clustering adapter.
//!
//! Turns a table into a standardized feature matrix, runs the seeded
//! [`KMeans`] and labels each row. Missing cells are imputed from the
//! current table, not the base table, so a filtered subset clusters on its
//! own statistics.

use crate::column::ColumnValue;
use crate::controls::ClusterFeature;
use crate::error::ClusterError;
use crate::kmeans::{FeatureMatrix, KMeans};
use crate::table::{Field, Table};
use crate::view::ComputedView;
use std::sync::Arc;

/// Seed for every clustering run.
pub const RANDOM_STATE: u64 = 42;
/// Restarts per run; the lowest inertia wins.
pub const N_INIT: usize = 10;
pub const MAX_ITER: usize = 300;
pub const TOLERANCE: f64 = 1e-4;

/// Feature used when the caller selects none.
pub const FALLBACK_FEATURES: [ClusterFeature; 1] = [ClusterFeature::Ladder];

/// Outcome of clustering one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    assignments: Vec<usize>,
    scaled: FeatureMatrix,
    features: Vec<ClusterFeature>,
    inertia: f64,
    k: usize,
}

impl Clustering {
    /// Cluster id of every row, in table order.
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    /// Standardized features, one row per table row.
    pub fn scaled(&self) -> &FeatureMatrix {
        &self.scaled
    }

    /// Features actually used, after the empty-selection fallback.
    pub fn features(&self) -> &[ClusterFeature] {
        &self.features
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Rows per cluster id.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &id in &self.assignments {
            sizes[id] += 1;
        }
        sizes
    }

    /// Up to three scaled coordinates per row. Missing axes repeat the first
    /// feature.
    pub fn projection_3d(&self) -> [Vec<f64>; 3] {
        let axis = |i: usize| {
            let c = if i < self.scaled.cols() { i } else { 0 };
            self.scaled.column(c)
        };
        [axis(0), axis(1), axis(2)]
    }
}

/// Display label for a cluster id. Ids map positionally; the label does not
/// reflect the cluster's actual happiness level.
pub fn cluster_name(id: usize) -> String {
    match id {
        0 => "Very Happy".to_string(),
        1 => "Happy".to_string(),
        2 => "Moderate".to_string(),
        3 => "Struggling".to_string(),
        n => format!("Cluster {n}"),
    }
}

/// Rescales each column to zero mean and unit population variance.
/// A constant column becomes all zeros.
pub fn standardize(columns: &[Vec<f64>]) -> FeatureMatrix {
    let scaled: Vec<Vec<f64>> = columns
        .iter()
        .map(|col| {
            let n = col.len() as f64;
            let mean = col.iter().sum::<f64>() / n;
            let std = (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            if std > 0.0 {
                col.iter().map(|v| (v - mean) / std).collect()
            } else {
                vec![0.0; col.len()]
            }
        })
        .collect();
    FeatureMatrix::from_columns(&scaled)
}

fn imputed(table: &Table, field: Field) -> Result<Vec<f64>, ClusterError> {
    let column = table.column(field)?;
    let cells = table.numbers(field)?;
    let mean = column.mean().ok_or(ClusterError::NoValues { field })?;
    Ok(cells.iter().map(|v| v.unwrap_or(mean)).collect())
}

/// Clusters the rows of `table` on `features` into `k` groups.
pub fn cluster(
    table: &Table,
    features: &[ClusterFeature],
    k: usize,
) -> Result<Clustering, ClusterError> {
    if k == 0 {
        return Err(ClusterError::InvalidClusterCount { k });
    }
    if table.len() < k {
        return Err(ClusterError::TooFewRows {
            rows: table.len(),
            k,
        });
    }

    let features = if features.is_empty() {
        FALLBACK_FEATURES.to_vec()
    } else {
        features.to_vec()
    };

    let columns = features
        .iter()
        .map(|feature| imputed(table, feature.field()))
        .collect::<Result<Vec<_>, _>>()?;
    let scaled = standardize(&columns);

    let fit = KMeans::new(k)
        .with_n_init(N_INIT)
        .with_max_iter(MAX_ITER)
        .with_tolerance(TOLERANCE)
        .with_random_state(RANDOM_STATE)
        .fit(&scaled)?;

    log::debug!(
        "clustered {} rows into {} groups on {:?} (inertia {:.4}, {} iterations)",
        table.len(),
        k,
        features.iter().map(|f| f.id()).collect::<Vec<_>>(),
        fit.inertia,
        fit.n_iter
    );

    Ok(Clustering {
        assignments: fit.labels,
        scaled,
        features,
        inertia: fit.inertia,
        k,
    })
}

/// A table with `Cluster` and `Cluster_Name` columns plus the clustering that
/// produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredTable {
    pub table: Arc<Table>,
    pub clustering: Clustering,
}

impl ClusteredTable {
    /// Clusters `source` and appends the id and label columns.
    pub fn build(
        name: &str,
        source: Arc<Table>,
        features: &[ClusterFeature],
        k: usize,
    ) -> Result<Self, ClusterError> {
        let clustering = cluster(&source, features, k)?;
        let ids: Arc<[usize]> = clustering.assignments.clone().into();
        let labels = Arc::clone(&ids);

        let table = ComputedView::new(name, source)
            .with_column(Field::Cluster, move |_, row| ColumnValue::Int64(ids[row] as i64))
            .with_column(Field::ClusterName, move |_, row| {
                ColumnValue::String(cluster_name(labels[row]))
            })
            .materialize()?;

        Ok(ClusteredTable {
            table: Arc::new(table),
            clustering,
        })
    }

    pub fn k(&self) -> usize {
        self.clustering.k()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::controls::default_cluster_features;
    use crate::table::fixtures::sample_table;

    fn default_features() -> Vec<ClusterFeature> {
        default_cluster_features().into_iter().collect()
    }

    #[test]
    fn test_cluster_names() {
        assert_eq!(cluster_name(0), "Very Happy");
        assert_eq!(cluster_name(3), "Struggling");
        assert_eq!(cluster_name(5), "Cluster 5");
    }

    #[test]
    fn test_standardize() {
        let m = standardize(&[vec![1.0, 2.0, 3.0], vec![4.0, 4.0, 4.0]]);
        let first = m.column(0);
        assert!((first[0] + 1.224744871).abs() < 1e-8);
        assert_eq!(first[1], 0.0);
        assert!((first[2] - 1.224744871).abs() < 1e-8);
        assert_eq!(m.column(1), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cluster_is_deterministic() {
        let table = sample_table();
        let a = cluster(&table, &default_features(), 4).unwrap();
        let b = cluster(&table, &default_features(), 4).unwrap();

        assert_eq!(a.assignments(), b.assignments());
        assert_eq!(a.inertia(), b.inertia());
        assert_eq!(a.assignments().len(), 12);
        assert!(a.assignments().iter().all(|&id| id < 4));
        assert_eq!(a.sizes().iter().sum::<usize>(), 12);
    }

    #[test]
    fn test_cluster_separates_extremes() {
        let table = sample_table();
        let result = cluster(&table, &default_features(), 2).unwrap();
        let ids = result.assignments();

        // Finland and Afghanistan sit at opposite ends of every feature.
        assert_ne!(ids[0], ids[11]);
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[10], ids[11]);
    }

    #[test]
    fn test_empty_features_fall_back_to_ladder() {
        let table = sample_table();
        let result = cluster(&table, &[], 3).unwrap();
        assert_eq!(result.features(), &[ClusterFeature::Ladder]);
        assert_eq!(result.scaled().cols(), 1);
    }

    #[test]
    fn test_projection_repeats_first_axis() {
        let table = sample_table();
        let result = cluster(&table, &[ClusterFeature::Ladder, ClusterFeature::Gdp], 2).unwrap();
        let [x, y, z] = result.projection_3d();

        assert_eq!(x, z);
        assert_ne!(x, y);
        assert_eq!(x.len(), 12);
    }

    #[test]
    fn test_rejects_invalid_k() {
        let table = sample_table();
        assert_eq!(
            cluster(&table, &default_features(), 0),
            Err(ClusterError::InvalidClusterCount { k: 0 })
        );
        assert_eq!(
            cluster(&table, &default_features(), 13),
            Err(ClusterError::TooFewRows { rows: 12, k: 13 })
        );
    }

    #[test]
    fn test_imputes_from_current_table() {
        let table = Table::new(
            "gaps",
            vec![
                Column::string(
                    Field::CountryName,
                    vec!["A".into(), "B".into(), "C".into()],
                ),
                Column::float64(Field::LadderScore, vec![Some(2.0), None, Some(4.0)]),
            ],
        )
        .unwrap();

        let result = cluster(&table, &[ClusterFeature::Ladder], 1).unwrap();
        // The gap is filled with the mean, which standardizes to zero.
        assert_eq!(result.scaled().get(1, 0), 0.0);

        let empty = Table::new(
            "none",
            vec![Column::float64(Field::LadderScore, vec![None, None])],
        )
        .unwrap();
        assert_eq!(
            cluster(&empty, &[ClusterFeature::Ladder], 1),
            Err(ClusterError::NoValues {
                field: Field::LadderScore
            })
        );
    }

    #[test]
    fn test_missing_feature_column() {
        let table = sample_table()
            .select("thin", &[Field::CountryName, Field::LadderScore])
            .unwrap();
        assert!(matches!(
            cluster(&table, &[ClusterFeature::Freedom], 2),
            Err(ClusterError::Table(_))
        ));
    }

    #[test]
    fn test_clustered_table_columns() {
        let clustered =
            ClusteredTable::build("clustered", Arc::new(sample_table()), &default_features(), 4)
                .unwrap();
        let table = &clustered.table;

        assert_eq!(table.name(), "clustered");
        assert_eq!(table.schema().len(), 10);
        let ids = table.ints(Field::Cluster).unwrap();
        let names = table.texts(Field::ClusterName).unwrap();
        for (id, name) in ids.iter().zip(names) {
            assert_eq!(*name, cluster_name(*id as usize));
        }
        assert_eq!(clustered.k(), 4);
    }
}
