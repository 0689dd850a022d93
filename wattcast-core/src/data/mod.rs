//! Series data model and the on-disk store.

pub mod schema;
pub mod series;
pub mod store;

pub use schema::{Source, SourceSchema};
pub use series::{merge_and_trim, Record, Series};
pub use store::{read_series_csv, write_series_csv, SeriesStore, StoreError, StoreStatus};
