//! Source identifiers and their fixed column schemas.
//!
//! Each remote source persists to one flat CSV with a fixed, versioned set
//! of value columns. The schema is validated on load and at ingestion, so
//! downstream code never probes for column presence at runtime.

use serde::{Deserialize, Serialize};

/// The three synchronized time series sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Electricity spot price (Pörssisähkö), quarter-hour ticks.
    Prices,
    /// Multi-station weather observations (FMI), 10-minute cadence.
    Weather,
    /// Grid consumption/production (Fingrid), 3-minute cadence.
    Fingrid,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Prices, Source::Weather, Source::Fingrid];

    /// Stable name, used for file names and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Source::Prices => "prices",
            Source::Weather => "weather",
            Source::Fingrid => "fingrid",
        }
    }

    pub fn schema(&self) -> &'static SourceSchema {
        match self {
            Source::Prices => &PRICES_SCHEMA,
            Source::Weather => &WEATHER_SCHEMA,
            Source::Fingrid => &FINGRID_SCHEMA,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed value-column layout for one source.
///
/// `columns` excludes the leading `timestamp_utc` column that every
/// persisted file carries.
#[derive(Debug)]
pub struct SourceSchema {
    pub version: u32,
    pub columns: &'static [&'static str],
}

impl SourceSchema {
    /// Number of value columns per record.
    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

pub static PRICES_SCHEMA: SourceSchema = SourceSchema {
    version: 1,
    columns: &["price_ct_per_kwh"],
};

pub static WEATHER_SCHEMA: SourceSchema = SourceSchema {
    version: 1,
    columns: &["temperature_c", "windspeed_ms", "rain_mm"],
};

pub static FINGRID_SCHEMA: SourceSchema = SourceSchema {
    version: 1,
    columns: &["consumption_mw", "production_mw"],
};
