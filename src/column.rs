/// Column storage for dashboard tables
///
/// A Column is an array-like random-access container indexed by row. Each
/// Column belongs to one schema [`Field`] and stores values of that field's
/// type. Numeric columns are nullable: a missing cell is `None` until the
/// dataset store imputes it.

use crate::error::TableError;
use crate::table::Field;
use std::fmt::Debug;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    String,
}

/// Column value enum to support multiple types
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int64(i64),
    Float64(f64),
    String(String),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Float64(v) => Some(*v),
            ColumnValue::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ColumnValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// JSON form used by tabular outputs. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ColumnValue::Int64(n) => serde_json::Value::Number((*n).into()),
            ColumnValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ColumnValue::String(s) => serde_json::Value::String(s.clone()),
            ColumnValue::Null => serde_json::Value::Null,
        }
    }
}

#[derive(Clone, PartialEq)]
enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<Option<f64>>),
    String(Vec<String>),
}

/// A typed, field-tagged vector of values.
#[derive(Clone, PartialEq)]
pub struct Column {
    field: Field,
    data: ColumnData,
}

impl Column {
    pub fn int64(field: Field, values: Vec<i64>) -> Self {
        Column {
            field,
            data: ColumnData::Int64(values),
        }
    }

    /// Nullable numeric column; `None` marks a missing cell.
    pub fn float64(field: Field, values: Vec<Option<f64>>) -> Self {
        Column {
            field,
            data: ColumnData::Float64(values),
        }
    }

    /// Numeric column with every cell present.
    pub fn from_f64(field: Field, values: Vec<f64>) -> Self {
        Self::float64(field, values.into_iter().map(Some).collect())
    }

    pub fn string(field: Field, values: Vec<String>) -> Self {
        Column {
            field,
            data: ColumnData::String(values),
        }
    }

    /// Builds a column of `field`'s type from loose values. Values of the wrong
    /// type are rejected; `Null` is only accepted by numeric columns.
    pub fn from_values(field: Field, values: Vec<ColumnValue>) -> Result<Self, TableError> {
        let expected = field.column_type();
        let mismatch = |value: &ColumnValue| TableError::TypeMismatch {
            field,
            expected,
            actual: match value {
                ColumnValue::Int64(_) => ColumnType::Int64,
                ColumnValue::Float64(_) | ColumnValue::Null => ColumnType::Float64,
                ColumnValue::String(_) => ColumnType::String,
            },
        };

        let data = match expected {
            ColumnType::Int64 => ColumnData::Int64(
                values
                    .iter()
                    .map(|v| v.as_i64().ok_or_else(|| mismatch(v)))
                    .collect::<Result<_, _>>()?,
            ),
            ColumnType::Float64 => ColumnData::Float64(
                values
                    .iter()
                    .map(|v| match v {
                        ColumnValue::Null => Ok(None),
                        other => other.as_f64().map(Some).ok_or_else(|| mismatch(other)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            ColumnType::String => ColumnData::String(
                values
                    .into_iter()
                    .map(|v| match v {
                        ColumnValue::String(s) => Ok(s),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };

        Ok(Column { field, data })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn column_type(&self) -> ColumnType {
        match self.data {
            ColumnData::Int64(_) => ColumnType::Int64,
            ColumnData::Float64(_) => ColumnType::Float64,
            ColumnData::String(_) => ColumnType::String,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Result<ColumnValue, TableError> {
        let len = self.len();
        let out_of_range = || TableError::RowOutOfRange { row: index, len };
        match &self.data {
            ColumnData::Int64(v) => v.get(index).map(|n| ColumnValue::Int64(*n)),
            ColumnData::Float64(v) => v
                .get(index)
                .map(|cell| cell.map_or(ColumnValue::Null, ColumnValue::Float64)),
            ColumnData::String(v) => v.get(index).map(|s| ColumnValue::String(s.clone())),
        }
        .ok_or_else(out_of_range)
    }

    /// Fast numeric access without building a `ColumnValue`.
    /// Returns None if the cell is missing, not numeric, or out of bounds.
    #[inline]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Float64(v) => v.get(index).copied().flatten(),
            ColumnData::Int64(v) => v.get(index).map(|n| *n as f64),
            ColumnData::String(_) => None,
        }
    }

    pub fn as_f64_slice(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64_slice(&self) -> Option<&[i64]> {
        match &self.data {
            ColumnData::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_slice(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::String(v) => Some(v),
            _ => None,
        }
    }

    /// Number of missing cells.
    pub fn null_count(&self) -> usize {
        match &self.data {
            ColumnData::Float64(v) => v.iter().filter(|cell| cell.is_none()).count(),
            _ => 0,
        }
    }

    /// Mean over the present numeric values, or None when there are none.
    pub fn mean(&self) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for i in 0..self.len() {
            if let Some(num) = self.get_f64(i) {
                sum += num;
                count += 1;
            }
        }
        if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        }
    }

    /// Replaces every missing cell with `value`. Returns how many were filled.
    pub fn fill_nulls(&mut self, value: f64) -> usize {
        let mut filled = 0;
        if let ColumnData::Float64(cells) = &mut self.data {
            for cell in cells.iter_mut().filter(|cell| cell.is_none()) {
                *cell = Some(value);
                filled += 1;
            }
        }
        filled
    }

    /// New column holding the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Result<Column, TableError> {
        let len = self.len();
        if let Some(&row) = indices.iter().find(|&&i| i >= len) {
            return Err(TableError::RowOutOfRange { row, len });
        }
        let data = match &self.data {
            ColumnData::Int64(v) => ColumnData::Int64(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Float64(v) => ColumnData::Float64(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::String(v) => {
                ColumnData::String(indices.iter().map(|&i| v[i].clone()).collect())
            }
        };
        Ok(Column {
            field: self.field,
            data,
        })
    }
}

impl Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Column {{ field: '{}', type: {:?}, len: {}, nulls: {} }}",
            self.field,
            self.column_type(),
            self.len(),
            self.null_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_basic() {
        let col = Column::from_f64(Field::LadderScore, vec![7.8, 7.5, 7.5]);

        assert_eq!(col.len(), 3);
        assert_eq!(col.column_type(), ColumnType::Float64);
        assert_eq!(col.get(0).unwrap().as_f64(), Some(7.8));
        assert_eq!(col.get_f64(2), Some(7.5));
        assert!(col.get(3).is_err());
    }

    #[test]
    fn test_column_nullable() {
        let col = Column::float64(Field::Generosity, vec![Some(0.1), None, Some(0.3)]);

        assert!(col.get(1).unwrap().is_null());
        assert_eq!(col.get_f64(1), None);
        assert_eq!(col.null_count(), 1);
        assert!((col.mean().unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_fill_nulls() {
        let mut col = Column::float64(Field::Corruption, vec![None, Some(0.5), None]);
        let mean = col.mean().unwrap();

        assert_eq!(col.fill_nulls(mean), 2);
        assert_eq!(col.null_count(), 0);
        assert_eq!(col.get_f64(0), Some(0.5));
    }

    #[test]
    fn test_mean_of_all_missing_is_none() {
        let col = Column::float64(Field::Freedom, vec![None, None]);
        assert_eq!(col.mean(), None);
    }

    #[test]
    fn test_take_preserves_order() {
        let col = Column::string(
            Field::CountryName,
            vec!["Finland".into(), "Denmark".into(), "Iceland".into()],
        );
        let picked = col.take(&[2, 0]).unwrap();

        assert_eq!(picked.as_str_slice().unwrap(), &["Iceland", "Finland"]);
        assert!(matches!(
            col.take(&[5]),
            Err(TableError::RowOutOfRange { row: 5, len: 3 })
        ));
    }

    #[test]
    fn test_from_values_rejects_wrong_type() {
        let err = Column::from_values(
            Field::Cluster,
            vec![ColumnValue::Int64(0), ColumnValue::String("x".into())],
        )
        .unwrap_err();

        assert!(matches!(err, TableError::TypeMismatch { field: Field::Cluster, .. }));

        let ok = Column::from_values(
            Field::LadderScore,
            vec![ColumnValue::Float64(1.0), ColumnValue::Null],
        )
        .unwrap();
        assert_eq!(ok.null_count(), 1);
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(ColumnValue::Float64(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(ColumnValue::Int64(3).to_json(), serde_json::json!(3));
        assert_eq!(
            ColumnValue::String("Chad".into()).to_json(),
            serde_json::json!("Chad")
        );
    }
}
