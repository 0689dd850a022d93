//! Feature builder: resample the three stores onto a common grid, align,
//! derive lag/rolling/calendar features and the forward target, and filter
//! down to the model-ready matrix.

pub mod derive;
pub mod matrix;
pub mod resample;
pub mod table;

pub use derive::{derive_features, derive_target, TARGET_COLUMN};
pub use matrix::{finalize, FeatureError, FeatureMatrix, FeatureRow, INFERENCE_ROWS};
pub use resample::{align, tick_grid, Aggregation};
pub use table::FeatureTable;

use crate::data::Series;
use chrono::Duration;

/// Full pipeline from the three merged stores to the model-ready matrix.
///
/// The feature builder only reads series; it never mutates the stores.
pub fn build_feature_matrix(
    prices: &Series,
    weather: &Series,
    fingrid: &Series,
    tick: Duration,
) -> FeatureMatrix {
    let mut table = align(&[prices, weather, fingrid], tick);
    derive_features(&mut table);
    derive_target(&mut table);
    finalize(&table)
}
