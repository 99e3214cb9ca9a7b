use super::model::Table;
use super::query::{Query, QueryError};

// ---------------------------------------------------------------------------
// Row filters
// ---------------------------------------------------------------------------

/// Return indices of rows without a missing value in any column.
pub fn complete_rows(table: &Table) -> Vec<usize> {
    (0..table.len())
        .filter(|&row| table.columns().iter().all(|c| !c.values[row].is_nan()))
        .collect()
}

/// Replace `±inf` with missing values, then drop every row that has a
/// missing value in any column (not only in the training variables).
pub fn drop_non_finite(table: &Table) -> Table {
    let mut cleaned = table.clone();
    cleaned.replace_infinite_with_nan();
    let keep = complete_rows(&cleaned);
    if keep.len() == cleaned.len() {
        return cleaned;
    }
    cleaned.take_rows(&keep)
}

/// Keep only the rows matching a query.
pub fn apply_query(table: &Table, query: &Query) -> Result<Table, QueryError> {
    let keep = query.matching_rows(table)?;
    Ok(table.take_rows(&keep))
}
