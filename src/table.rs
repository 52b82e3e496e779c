/// Dashboard Table Implementation
///
/// A Table is an immutable collection of columns keyed by the fixed [`Field`]
/// schema. Derived tables (filtered, searched, clustered) are built as new
/// tables; nothing mutates a table after construction.
///
/// # Examples
///
/// ```
/// use happiness_dashboard::{Column, Field, Table};
///
/// let table = Table::new(
///     "scores",
///     vec![
///         Column::string(Field::CountryName, vec!["Finland".into(), "Denmark".into()]),
///         Column::from_f64(Field::LadderScore, vec![7.804, 7.586]),
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(table.len(), 2);
/// assert_eq!(
///     table.get_value(1, Field::CountryName).unwrap().as_string(),
///     Some("Denmark")
/// );
/// assert!(table.numbers(Field::Generosity).is_err());
/// ```

use crate::column::{Column, ColumnType, ColumnValue};
use crate::error::TableError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Every column the dashboard knows about.
///
/// The first eight are read from the input file; `Cluster` and `ClusterName`
/// are added by the clustering view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    CountryName,
    LadderScore,
    LoggedGdp,
    SocialSupport,
    HealthyLifeExpectancy,
    Freedom,
    Generosity,
    Corruption,
    Cluster,
    ClusterName,
}

impl Field {
    /// Columns that must be present in the input file.
    pub const REQUIRED: [Field; 8] = [
        Field::CountryName,
        Field::LadderScore,
        Field::LoggedGdp,
        Field::SocialSupport,
        Field::HealthyLifeExpectancy,
        Field::Freedom,
        Field::Generosity,
        Field::Corruption,
    ];

    /// Numeric input columns, in file order.
    pub const NUMERIC: [Field; 7] = [
        Field::LadderScore,
        Field::LoggedGdp,
        Field::SocialSupport,
        Field::HealthyLifeExpectancy,
        Field::Freedom,
        Field::Generosity,
        Field::Corruption,
    ];

    /// Column header as it appears in the input file.
    pub fn header(self) -> &'static str {
        match self {
            Field::CountryName => "Country name",
            Field::LadderScore => "Ladder score",
            Field::LoggedGdp => "Logged GDP per capita",
            Field::SocialSupport => "Social support",
            Field::HealthyLifeExpectancy => "Healthy life expectancy",
            Field::Freedom => "Freedom to make life choices",
            Field::Generosity => "Generosity",
            Field::Corruption => "Perceptions of corruption",
            Field::Cluster => "Cluster",
            Field::ClusterName => "Cluster_Name",
        }
    }

    /// Looks a field up by header. Surrounding whitespace is ignored.
    pub fn from_header(header: &str) -> Option<Field> {
        let header = header.trim();
        Field::REQUIRED
            .iter()
            .chain([Field::Cluster, Field::ClusterName].iter())
            .copied()
            .find(|field| field.header() == header)
    }

    pub fn column_type(self) -> ColumnType {
        match self {
            Field::CountryName | Field::ClusterName => ColumnType::String,
            Field::Cluster => ColumnType::Int64,
            _ => ColumnType::Float64,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// One fully populated country row.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    pub country: String,
    pub ladder_score: f64,
    pub logged_gdp: f64,
    pub social_support: f64,
    pub healthy_life_expectancy: f64,
    pub freedom: f64,
    pub generosity: f64,
    pub corruption: f64,
}

/// A row keyed by field.
pub type Row = HashMap<Field, ColumnValue>;

/// Ordered list of the fields a table carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Schema { fields }
    }

    /// Returns the number of columns in the schema.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Returns the index of a column, or None if the table lacks it.
    pub fn get_column_index(&self, field: Field) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }
}

/// Immutable columnar table.
#[derive(Clone, PartialEq)]
pub struct Table {
    name: String,
    schema: Schema,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Builds a table from columns. Every column must match its field's type
    /// and all columns must have the same length.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, TableError> {
        let row_count = columns.first().map_or(0, Column::len);
        let mut fields = Vec::with_capacity(columns.len());

        for col in &columns {
            let field = col.field();
            if fields.contains(&field) {
                return Err(TableError::DuplicateColumn(field));
            }
            if col.column_type() != field.column_type() {
                return Err(TableError::TypeMismatch {
                    field,
                    expected: field.column_type(),
                    actual: col.column_type(),
                });
            }
            if col.len() != row_count {
                return Err(TableError::LengthMismatch {
                    field,
                    expected: row_count,
                    actual: col.len(),
                });
            }
            fields.push(field);
        }

        Ok(Table {
            name: name.into(),
            schema: Schema::new(fields),
            columns,
            row_count,
        })
    }

    /// Builds a table carrying all eight input fields.
    pub fn from_records(name: impl Into<String>, records: &[CountryRecord]) -> Self {
        let numeric = |get: fn(&CountryRecord) -> f64| records.iter().map(get).collect::<Vec<_>>();
        let columns = vec![
            Column::string(
                Field::CountryName,
                records.iter().map(|r| r.country.clone()).collect(),
            ),
            Column::from_f64(Field::LadderScore, numeric(|r| r.ladder_score)),
            Column::from_f64(Field::LoggedGdp, numeric(|r| r.logged_gdp)),
            Column::from_f64(Field::SocialSupport, numeric(|r| r.social_support)),
            Column::from_f64(
                Field::HealthyLifeExpectancy,
                numeric(|r| r.healthy_life_expectancy),
            ),
            Column::from_f64(Field::Freedom, numeric(|r| r.freedom)),
            Column::from_f64(Field::Generosity, numeric(|r| r.generosity)),
            Column::from_f64(Field::Corruption, numeric(|r| r.corruption)),
        ];

        Table {
            name: name.into(),
            schema: Schema::new(Field::REQUIRED.to_vec()),
            columns,
            row_count: records.len(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn has_column(&self, field: Field) -> bool {
        self.schema.contains(field)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, field: Field) -> Result<&Column, TableError> {
        self.schema
            .get_column_index(field)
            .map(|idx| &self.columns[idx])
            .ok_or(TableError::MissingColumn(field))
    }

    /// Numeric cells of `field`; `None` marks a missing value.
    pub fn numbers(&self, field: Field) -> Result<&[Option<f64>], TableError> {
        let col = self.column(field)?;
        col.as_f64_slice().ok_or(TableError::TypeMismatch {
            field,
            expected: ColumnType::Float64,
            actual: col.column_type(),
        })
    }

    pub fn ints(&self, field: Field) -> Result<&[i64], TableError> {
        let col = self.column(field)?;
        col.as_i64_slice().ok_or(TableError::TypeMismatch {
            field,
            expected: ColumnType::Int64,
            actual: col.column_type(),
        })
    }

    pub fn texts(&self, field: Field) -> Result<&[String], TableError> {
        let col = self.column(field)?;
        col.as_str_slice().ok_or(TableError::TypeMismatch {
            field,
            expected: ColumnType::String,
            actual: col.column_type(),
        })
    }

    /// Present values of a numeric column, skipping missing cells.
    pub fn present_values(&self, field: Field) -> Result<Vec<f64>, TableError> {
        Ok(self.numbers(field)?.iter().flatten().copied().collect())
    }

    pub fn get_value(&self, row: usize, field: Field) -> Result<ColumnValue, TableError> {
        if row >= self.row_count {
            return Err(TableError::RowOutOfRange {
                row,
                len: self.row_count,
            });
        }
        self.column(field)?.get(row)
    }

    pub fn get_row(&self, row: usize) -> Result<Row, TableError> {
        if row >= self.row_count {
            return Err(TableError::RowOutOfRange {
                row,
                len: self.row_count,
            });
        }
        self.columns
            .iter()
            .map(|col| Ok((col.field(), col.get(row)?)))
            .collect()
    }

    pub fn iter_rows(&self) -> TableRowIterator<'_> {
        TableRowIterator {
            table: self,
            index: 0,
        }
    }

    /// New table holding the rows at `indices`, in that order.
    pub fn take(&self, name: impl Into<String>, indices: &[usize]) -> Result<Table, TableError> {
        let columns = self
            .columns
            .iter()
            .map(|col| col.take(indices))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table {
            name: name.into(),
            schema: self.schema.clone(),
            columns,
            row_count: indices.len(),
        })
    }

    /// New table with only `fields`, in the given order.
    pub fn select(&self, name: impl Into<String>, fields: &[Field]) -> Result<Table, TableError> {
        let columns = fields
            .iter()
            .map(|field| self.column(*field).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table {
            name: name.into(),
            schema: Schema::new(fields.to_vec()),
            columns,
            row_count: self.row_count,
        })
    }

    /// New table with `extra` columns appended.
    pub fn with_columns(
        &self,
        name: impl Into<String>,
        extra: Vec<Column>,
    ) -> Result<Table, TableError> {
        let mut columns = self.columns.clone();
        columns.extend(extra);
        Table::new(name, columns)
    }
}

pub struct TableRowIterator<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Iterator for TableRowIterator<'a> {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.table.row_count {
            None
        } else {
            let result = self.table.get_row(self.index).ok();
            self.index += 1;
            result
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Table {{ name: '{}', columns: {}, rows: {} }}",
            self.name,
            self.schema.len(),
            self.row_count
        )
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn record(country: &str, ladder: f64, gdp: f64) -> CountryRecord {
        CountryRecord {
            country: country.to_string(),
            ladder_score: ladder,
            logged_gdp: gdp,
            social_support: 0.5 + ladder / 20.0,
            healthy_life_expectancy: 50.0 + ladder * 3.0,
            freedom: 0.6 + ladder / 50.0,
            generosity: 0.1 - ladder / 100.0,
            corruption: 0.9 - ladder / 15.0,
        }
    }

    /// Small table with well separated happiness levels.
    pub fn sample_table() -> Table {
        Table::from_records(
            "sample",
            &[
                record("Finland", 7.804, 10.792),
                record("Denmark", 7.586, 10.962),
                record("Iceland", 7.530, 10.896),
                record("Israel", 7.473, 10.639),
                record("Costa Rica", 6.609, 9.693),
                record("Mexico", 6.330, 9.859),
                record("Brazil", 6.125, 9.567),
                record("Nigeria", 4.981, 8.496),
                record("India", 4.036, 8.759),
                record("Zimbabwe", 3.204, 7.641),
                record("Sierra Leone", 3.138, 7.394),
                record("Afghanistan", 1.859, 7.324),
            ],
        )
    }
}
