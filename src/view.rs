/// Table views
///
/// Views are read-only derivations over a parent table. Each keeps an index
/// mapping into the parent instead of copying rows, and can be materialized
/// into a standalone [`Table`] when a consumer needs owned data.

use crate::column::{Column, ColumnValue};
use crate::controls::FilterCriteria;
use crate::error::TableError;
use crate::table::{Field, Row, Table};
use std::cmp::Ordering;
use std::sync::Arc;

/// A FilterView keeps the parent rows that satisfy a predicate.
/// Maintains a mapping from view indices to parent indices, in parent order.
pub struct FilterView {
    name: String,
    parent: Arc<Table>,
    view_to_parent: Vec<usize>,
}

impl FilterView {
    pub fn new<F>(name: impl Into<String>, parent: Arc<Table>, predicate: F) -> Self
    where
        F: Fn(&Row) -> bool,
    {
        let view_to_parent = parent
            .iter_rows()
            .enumerate()
            .filter(|(_, row)| predicate(row))
            .map(|(i, _)| i)
            .collect();

        FilterView {
            name: name.into(),
            parent,
            view_to_parent,
        }
    }

    /// Rows whose happiness score and GDP both fall inside the closed ranges.
    /// Rows with a missing value in either column never match.
    pub fn by_criteria(
        name: impl Into<String>,
        parent: Arc<Table>,
        criteria: &FilterCriteria,
    ) -> Result<Self, TableError> {
        let view_to_parent = {
            let ladder = parent.numbers(Field::LadderScore)?;
            let gdp = parent.numbers(Field::LoggedGdp)?;
            ladder
                .iter()
                .zip(gdp)
                .enumerate()
                .filter_map(|(i, cells)| match cells {
                    (Some(l), Some(g)) if criteria.matches(*l, *g) => Some(i),
                    _ => None,
                })
                .collect()
        };

        Ok(FilterView {
            name: name.into(),
            parent,
            view_to_parent,
        })
    }

    /// Rows whose country name contains `needle`, ignoring case.
    /// An empty needle matches every row.
    pub fn by_name(
        name: impl Into<String>,
        parent: Arc<Table>,
        needle: &str,
    ) -> Result<Self, TableError> {
        let needle = needle.to_lowercase();
        let view_to_parent = parent
            .texts(Field::CountryName)?
            .iter()
            .enumerate()
            .filter(|(_, country)| needle.is_empty() || country.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();

        Ok(FilterView {
            name: name.into(),
            parent,
            view_to_parent,
        })
    }

    /// Keeps only the first `limit` matching rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.view_to_parent.truncate(limit);
        self
    }

    pub fn len(&self) -> usize {
        self.view_to_parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view_to_parent.is_empty()
    }

    pub fn get_row(&self, index: usize) -> Result<Row, TableError> {
        let parent_index = self.parent_index(index)?;
        self.parent.get_row(parent_index)
    }

    pub fn get_value(&self, row: usize, field: Field) -> Result<ColumnValue, TableError> {
        let parent_index = self.parent_index(row)?;
        self.parent.get_value(parent_index, field)
    }

    pub fn parent_indices(&self) -> &[usize] {
        &self.view_to_parent
    }

    fn parent_index(&self, index: usize) -> Result<usize, TableError> {
        self.view_to_parent
            .get(index)
            .copied()
            .ok_or(TableError::RowOutOfRange {
                row: index,
                len: self.len(),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copies the matching rows into a new table named after the view.
    pub fn materialize(&self) -> Result<Table, TableError> {
        self.parent.take(self.name.as_str(), &self.view_to_parent)
    }
}

/// A ProjectionView selects specific columns from the parent table.
pub struct ProjectionView {
    name: String,
    parent: Arc<Table>,
    selected: Vec<Field>,
}

impl ProjectionView {
    pub fn new(
        name: impl Into<String>,
        parent: Arc<Table>,
        fields: Vec<Field>,
    ) -> Result<Self, TableError> {
        // Validate columns exist
        for field in &fields {
            if !parent.has_column(*field) {
                return Err(TableError::MissingColumn(*field));
            }
        }

        Ok(ProjectionView {
            name: name.into(),
            parent,
            selected: fields,
        })
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn get_row(&self, index: usize) -> Result<Row, TableError> {
        self.selected
            .iter()
            .map(|field| Ok((*field, self.parent.get_value(index, *field)?)))
            .collect()
    }

    pub fn get_value(&self, row: usize, field: Field) -> Result<ColumnValue, TableError> {
        if !self.selected.contains(&field) {
            return Err(TableError::MissingColumn(field));
        }
        self.parent.get_value(row, field)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.selected
    }

    pub fn materialize(&self) -> Result<Table, TableError> {
        self.parent.select(self.name.as_str(), &self.selected)
    }
}

type ComputeFn = Box<dyn Fn(&Table, usize) -> ColumnValue>;

/// A ComputedView adds derived columns to the parent table.
/// Values are calculated on the fly from the parent row index.
pub struct ComputedView {
    name: String,
    parent: Arc<Table>,
    computed: Vec<(Field, ComputeFn)>,
}

impl ComputedView {
    pub fn new(name: impl Into<String>, parent: Arc<Table>) -> Self {
        ComputedView {
            name: name.into(),
            parent,
            computed: Vec::new(),
        }
    }

    pub fn with_column<F>(mut self, field: Field, compute: F) -> Self
    where
        F: Fn(&Table, usize) -> ColumnValue + 'static,
    {
        self.computed.push((field, Box::new(compute)));
        self
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn get_row(&self, index: usize) -> Result<Row, TableError> {
        let mut row = self.parent.get_row(index)?;
        for (field, compute) in &self.computed {
            row.insert(*field, compute(&self.parent, index));
        }
        Ok(row)
    }

    pub fn get_value(&self, row: usize, field: Field) -> Result<ColumnValue, TableError> {
        match self.computed.iter().find(|(f, _)| *f == field) {
            Some((_, compute)) => {
                if row >= self.parent.len() {
                    return Err(TableError::RowOutOfRange {
                        row,
                        len: self.parent.len(),
                    });
                }
                Ok(compute(&self.parent, row))
            }
            None => self.parent.get_value(row, field),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates every computed column and appends it to a copy of the parent.
    pub fn materialize(&self) -> Result<Table, TableError> {
        let extra = self
            .computed
            .iter()
            .map(|(field, compute)| {
                let values = (0..self.parent.len())
                    .map(|row| compute(&self.parent, row))
                    .collect();
                Column::from_values(*field, values)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.parent.with_columns(self.name.as_str(), extra)
    }
}

/// Sort order specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order (smallest first)
    Ascending,
    /// Descending order (largest first)
    Descending,
}

/// A single sort key specifying a column and order
#[derive(Debug, Clone)]
pub struct SortKey {
    pub field: Field,
    pub order: SortOrder,
    /// Whether missing values should be placed first or last
    pub nulls_first: bool,
}

impl SortKey {
    /// Ascending order, missing values last
    pub fn ascending(field: Field) -> Self {
        SortKey {
            field,
            order: SortOrder::Ascending,
            nulls_first: false,
        }
    }

    /// Descending order, missing values last
    pub fn descending(field: Field) -> Self {
        SortKey {
            field,
            order: SortOrder::Descending,
            nulls_first: false,
        }
    }
}

/// A SortedView presents rows from the parent table in sorted order.
///
/// Sorting is stable: rows with equal keys keep their parent order, so the
/// first `n` rows of a descending view are the `n` largest with ties resolved
/// in favour of earlier rows.
///
/// # Examples
///
/// ```
/// use happiness_dashboard::{Column, Field, SortKey, SortedView, Table};
/// use std::sync::Arc;
///
/// let table = Arc::new(
///     Table::new(
///         "scores",
///         vec![
///             Column::string(Field::CountryName, vec!["Chad".into(), "Norway".into()]),
///             Column::from_f64(Field::LadderScore, vec![4.4, 7.3]),
///         ],
///     )
///     .unwrap(),
/// );
///
/// let sorted = SortedView::new("by_score", table, vec![SortKey::descending(Field::LadderScore)])
///     .unwrap();
/// assert_eq!(
///     sorted.get_value(0, Field::CountryName).unwrap().as_string(),
///     Some("Norway")
/// );
/// ```
pub struct SortedView {
    name: String,
    parent: Arc<Table>,
    sort_keys: Vec<SortKey>,
    /// sorted_index[view_pos] = parent_row_index
    sorted_index: Vec<usize>,
}

impl SortedView {
    pub fn new(
        name: impl Into<String>,
        parent: Arc<Table>,
        sort_keys: Vec<SortKey>,
    ) -> Result<Self, TableError> {
        for key in &sort_keys {
            if !parent.has_column(key.field) {
                return Err(TableError::MissingColumn(key.field));
            }
        }

        let mut view = SortedView {
            name: name.into(),
            parent,
            sort_keys,
            sorted_index: Vec::new(),
        };
        view.rebuild_index();
        Ok(view)
    }

    fn rebuild_index(&mut self) {
        let table = &self.parent;
        let mut index: Vec<usize> = (0..table.len()).collect();

        index.sort_by(|&a, &b| {
            for key in &self.sort_keys {
                let val_a = table.get_value(a, key.field).ok();
                let val_b = table.get_value(b, key.field).ok();

                let cmp = Self::compare_values(val_a.as_ref(), val_b.as_ref(), key);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });

        self.sorted_index = index;
    }

    fn compare_values(
        val_a: Option<&ColumnValue>,
        val_b: Option<&ColumnValue>,
        key: &SortKey,
    ) -> Ordering {
        let val_a = val_a.filter(|v| !v.is_null());
        let val_b = val_b.filter(|v| !v.is_null());

        let (a, b) = match (val_a, val_b) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => {
                return if key.nulls_first {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
            }
            (Some(_), None) => {
                return if key.nulls_first {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
            }
            (Some(a), Some(b)) => (a, b),
        };

        let base_cmp = match (a, b) {
            (ColumnValue::Int64(a), ColumnValue::Int64(b)) => a.cmp(b),
            (ColumnValue::Float64(a), ColumnValue::Float64(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (ColumnValue::String(a), ColumnValue::String(b)) => a.cmp(b),
            // Mixed types - compare by debug form for deterministic ordering
            (a, b) => format!("{:?}", a).cmp(&format!("{:?}", b)),
        };

        match key.order {
            SortOrder::Ascending => base_cmp,
            SortOrder::Descending => base_cmp.reverse(),
        }
    }

    /// Keeps only the first `n` rows of the sorted order.
    pub fn top(mut self, n: usize) -> Self {
        self.sorted_index.truncate(n);
        self
    }

    /// Reverses the current order in place.
    pub fn reversed(mut self) -> Self {
        self.sorted_index.reverse();
        self
    }

    pub fn len(&self) -> usize {
        self.sorted_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_index.is_empty()
    }

    pub fn get_row(&self, index: usize) -> Result<Row, TableError> {
        let parent_index = self.parent_index_checked(index)?;
        self.parent.get_row(parent_index)
    }

    pub fn get_value(&self, row: usize, field: Field) -> Result<ColumnValue, TableError> {
        let parent_index = self.parent_index_checked(row)?;
        self.parent.get_value(parent_index, field)
    }

    /// Returns the parent table row index for a given view position
    pub fn get_parent_index(&self, view_index: usize) -> Option<usize> {
        self.sorted_index.get(view_index).copied()
    }

    fn parent_index_checked(&self, index: usize) -> Result<usize, TableError> {
        self.get_parent_index(index).ok_or(TableError::RowOutOfRange {
            row: index,
            len: self.len(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn materialize(&self) -> Result<Table, TableError> {
        self.parent.take(self.name.as_str(), &self.sorted_index)
    }
}
