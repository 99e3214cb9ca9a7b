/// Data layer: table type, file formats, and row filtering.
///
/// Architecture:
/// ```text
///  .h5 / .json / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │    io     │  extension → Format → Table (and back)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  named f64 columns + row index
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop non-finite rows, apply query
///   └──────────┘
/// ```

pub mod filter;
pub mod io;
pub mod model;
pub mod query;

pub use io::{check_extension, read_table, write_table, Format, FormatError};
pub use model::{Column, Table, TableError};
pub use query::{Query, QueryError};
