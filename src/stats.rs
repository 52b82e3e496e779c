//! Descriptive statistics over table columns.
//!
//! All functions are pure. Missing cells are skipped; an empty column is an
//! explicit [`StatsError::EmptyInput`] rather than a NaN.

use crate::error::{StatsError, TableError};
use crate::table::{Field, Table};
use serde::Serialize;

/// Summary of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
}

impl Summary {
    /// Summarizes a slice of values, or None when it is empty.
    pub fn from_values(values: &[f64]) -> Option<Summary> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        // A single observation has no sample spread; report 0 instead of NaN.
        let std = if count > 1 {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        Some(Summary {
            count,
            mean,
            median: quantile_sorted(&sorted, 0.5),
            std,
            min: sorted[0],
            max: sorted[count - 1],
            q25: quantile_sorted(&sorted, 0.25),
            q75: quantile_sorted(&sorted, 0.75),
        })
    }
}

/// Linear-interpolated quantile of already sorted values.
///
/// Uses position `q * (n - 1)` and interpolates between the two neighbouring
/// order statistics. `sorted` must be non-empty.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Summary statistics over the present values of `field`.
pub fn summarize(table: &Table, field: Field) -> Result<Summary, StatsError> {
    let values = table.present_values(field)?;
    Summary::from_values(&values).ok_or(StatsError::EmptyInput { field })
}

/// Mean over the present values of `field`.
pub fn column_mean(table: &Table, field: Field) -> Result<f64, StatsError> {
    table
        .column(field)?
        .mean()
        .ok_or(StatsError::EmptyInput { field })
}

/// Pearson correlation over pairs where both values are present.
///
/// Undefined correlations (fewer than two pairs, or a constant side) are
/// reported as 0.0.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}

/// Square correlation matrix over `fields`, in the given order.
/// The diagonal is always 1.0.
pub fn correlation_matrix(table: &Table, fields: &[Field]) -> Result<Vec<Vec<f64>>, TableError> {
    let columns = fields
        .iter()
        .map(|field| table.numbers(*field))
        .collect::<Result<Vec<_>, _>>()?;

    let n = columns.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(columns[i], columns[j]);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::table::fixtures::sample_table;

    fn ladder_table(values: Vec<Option<f64>>) -> Table {
        Table::new("t", vec![Column::float64(Field::LadderScore, values)]).unwrap()
    }

    #[test]
    fn test_summarize_one_to_five() {
        let table = ladder_table(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]);
        let s = summarize(&table, Field::LadderScore).unwrap();

        assert_eq!(s.count, 5);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.median, 3.0);
        assert!((s.std - 1.5811).abs() < 1e-4);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.q25, 2.0);
        assert_eq!(s.q75, 4.0);
    }

    #[test]
    fn test_summarize_interpolates_quartiles() {
        let table = ladder_table(vec![Some(4.0), Some(1.0), Some(3.0), Some(2.0)]);
        let s = summarize(&table, Field::LadderScore).unwrap();

        assert_eq!(s.median, 2.5);
        assert_eq!(s.q25, 1.75);
        assert_eq!(s.q75, 3.25);
    }

    #[test]
    fn test_summarize_empty_is_error() {
        let table = ladder_table(vec![]);
        assert_eq!(
            summarize(&table, Field::LadderScore),
            Err(StatsError::EmptyInput {
                field: Field::LadderScore
            })
        );

        let all_missing = ladder_table(vec![None, None]);
        assert!(matches!(
            summarize(&all_missing, Field::LadderScore),
            Err(StatsError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_summarize_missing_column() {
        let table = ladder_table(vec![Some(1.0)]);
        assert!(matches!(
            summarize(&table, Field::Freedom),
            Err(StatsError::Table(TableError::MissingColumn(Field::Freedom)))
        ));
    }

    #[test]
    fn test_single_value_has_zero_std() {
        let s = Summary::from_values(&[6.2]).unwrap();
        assert_eq!(s.std, 0.0);
        assert_eq!(s.q25, 6.2);
        assert_eq!(s.q75, 6.2);
    }

    #[test]
    fn test_column_mean_skips_missing() {
        let table = ladder_table(vec![Some(2.0), None, Some(4.0)]);
        assert_eq!(column_mean(&table, Field::LadderScore), Ok(3.0));
    }

    #[test]
    fn test_pearson() {
        let x = [Some(1.0), Some(2.0), Some(3.0)];
        assert!((pearson(&x, &[Some(2.0), Some(4.0), Some(6.0)]) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[Some(3.0), Some(2.0), Some(1.0)]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[Some(1.0), Some(1.0), Some(1.0)]), 0.0);
        assert_eq!(pearson(&x, &[None, None, Some(1.0)]), 0.0);
    }

    #[test]
    fn test_correlation_matrix_is_symmetric() {
        let table = sample_table();
        let m = correlation_matrix(&table, &Field::NUMERIC).unwrap();

        assert_eq!(m.len(), 7);
        for i in 0..7 {
            assert_eq!(m[i][i], 1.0);
            for j in 0..7 {
                assert_eq!(m[i][j], m[j][i]);
                assert!(m[i][j].abs() <= 1.0);
            }
        }
        // Fixture factors are linear in the ladder score.
        assert!((m[0][2] - 1.0).abs() < 1e-9);
        assert!((m[0][6] + 1.0).abs() < 1e-9);
    }
}
