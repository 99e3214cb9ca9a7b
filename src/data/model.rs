use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// TableError – structural problems with columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("column '{column}' has {found} values but the table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("index has {found} labels but the table has {expected} rows")]
    IndexLength { expected: usize, found: usize },
}

// ---------------------------------------------------------------------------
// Column – one named numeric series
// ---------------------------------------------------------------------------

/// A named column of numeric values. Missing values are `NaN`.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Table – the complete event list
// ---------------------------------------------------------------------------

/// A columnar table of numeric event features with a row index.
///
/// The index holds the row labels of the file the table was read from and
/// survives row filtering, so a written table still tells which input rows
/// made it through.
#[derive(Debug, Clone, Default)]
pub struct Table {
    index: Vec<i64>,
    columns: Vec<Column>,
}

impl Table {
    /// An empty table with `rows` rows, a `0..rows` index and no columns.
    pub fn with_rows(rows: usize) -> Self {
        Table {
            index: (0..rows as i64).collect(),
            columns: Vec::new(),
        }
    }

    /// Build a table from `(name, values)` pairs with a `0..n` index.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut columns = columns.into_iter().map(|(n, v)| (n.into(), v)).peekable();
        let rows = columns.peek().map(|(_, v)| v.len()).unwrap_or(0);
        let mut table = Table::with_rows(rows);
        let mut seen = HashSet::new();
        for (name, values) in columns {
            if !seen.insert(name.clone()) {
                return Err(TableError::DuplicateColumn(name));
            }
            table.set_column(name, values)?;
        }
        Ok(table)
    }

    /// Replace the row labels.
    pub fn with_index(mut self, index: Vec<i64>) -> Result<Self, TableError> {
        if index.len() != self.len() {
            return Err(TableError::IndexLength {
                expected: self.len(),
                found: index.len(),
            });
        }
        self.index = index;
        Ok(self)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Position of a column in table order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64], TableError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Insert a new column at the end, or overwrite an existing one in place.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.len(),
                found: values.len(),
            });
        }
        match self.position(&name) {
            Some(pos) => self.columns[pos].values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    /// Copy of the table restricted to the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: rows.iter().map(|&r| c.values[r]).collect(),
                })
                .collect(),
        }
    }

    /// Row-major matrix of the named columns, in the order given.
    pub fn feature_rows(&self, names: &[String]) -> Result<Vec<Vec<f64>>, TableError> {
        let cols = names
            .iter()
            .map(|n| self.column(n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((0..self.len())
            .map(|row| cols.iter().map(|c| c[row]).collect())
            .collect())
    }

    /// Round the named columns to single precision.
    ///
    /// Finite values beyond the `f32` range become infinite. Returns how many
    /// values did so.
    pub fn cast_to_f32(&mut self, names: &[String]) -> Result<usize, TableError> {
        let mut overflowed = 0;
        for name in names {
            let pos = self
                .position(name)
                .ok_or_else(|| TableError::MissingColumn(name.clone()))?;
            for v in &mut self.columns[pos].values {
                let cast = *v as f32 as f64;
                if v.is_finite() && cast.is_infinite() {
                    overflowed += 1;
                }
                *v = cast;
            }
        }
        Ok(overflowed)
    }

    /// Turn `±inf` into `NaN` across every column.
    pub fn replace_infinite_with_nan(&mut self) {
        for c in &mut self.columns {
            for v in &mut c.values {
                if v.is_infinite() {
                    *v = f64::NAN;
                }
            }
        }
    }
}

/// Two values are the same when they are equal or both missing.
fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(&a, &b)| same_value(a, b))
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.columns == other.columns
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows × {} columns", self.len(), self.columns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns([
            ("a", vec![1.0, 2.0, 3.0]),
            ("b", vec![4.0, f64::NAN, 6.0]),
        ])
        .unwrap()
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let err = Table::from_columns([("a", vec![1.0, 2.0]), ("b", vec![1.0])]).unwrap_err();
        assert_eq!(
            err,
            TableError::LengthMismatch {
                column: "b".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn from_columns_rejects_duplicates() {
        let err = Table::from_columns([("a", vec![1.0]), ("a", vec![2.0])]).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("a".into()));
    }

    #[test]
    fn set_column_overwrites_in_place() {
        let mut t = sample();
        t.set_column("a", vec![9.0, 8.0, 7.0]).unwrap();
        t.set_column("c", vec![0.0; 3]).unwrap();
        assert_eq!(t.column_names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(t.column("a").unwrap(), &[9.0, 8.0, 7.0]);
    }

    #[test]
    fn take_rows_keeps_labels() {
        let t = sample().take_rows(&[2, 0]);
        assert_eq!(t.index(), &[2, 0]);
        assert_eq!(t.column("a").unwrap(), &[3.0, 1.0]);
    }

    #[test]
    fn feature_rows_follow_requested_order() {
        let rows = sample()
            .feature_rows(&["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(rows[2], vec![6.0, 3.0]);
        assert!(sample().feature_rows(&["zzz".to_string()]).is_err());
    }

    #[test]
    fn cast_to_f32_overflows_to_infinity() {
        let mut t = Table::from_columns([("x", vec![1e300, -1e300, 0.1])]).unwrap();
        let overflowed = t.cast_to_f32(&["x".to_string()]).unwrap();
        assert_eq!(overflowed, 2);
        let x = t.column("x").unwrap();
        assert_eq!(x[0], f64::INFINITY);
        assert_eq!(x[1], f64::NEG_INFINITY);
        assert_eq!(x[2], 0.1f32 as f64);
    }

    #[test]
    fn equality_treats_nan_as_equal() {
        assert_eq!(sample(), sample());
    }
}
