//! Storage layer: Parquet snapshots (scraped, canonical, staging, diff) and
//! on-disk icons.

mod error;
pub use error::StoreError;

pub mod images;
pub mod persist;
pub mod snapshot;

pub use images::{ImageDir, icon_file_name, sanitize_name};
pub use persist::{read_parquet, write_parquet};
pub use snapshot::{ParquetSink, ParquetSource, read_records, write_diff, write_records};
