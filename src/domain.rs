use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ArgoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wmo(u32);

impl Wmo {
    pub fn new(value: u32) -> Result<Self, ArgoError> {
        if value == 0 {
            return Err(ArgoError::InvalidWmo(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Wmo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Wmo {
    type Err = ArgoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let parsed = normalized
            .parse::<u32>()
            .map_err(|_| ArgoError::InvalidWmo(value.to_string()))?;
        Self::new(parsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ArgoError> {
        if start > end {
            return Err(ArgoError::InvalidTimeRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Accepts `YYYY-MM-DD` or `YYYY-MM` (resolved to the first of the month).
    pub fn parse(start: &str, end: &str) -> Result<Self, ArgoError> {
        Self::new(parse_date_bound(start)?, parse_date_bound(end)?)
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

fn parse_date_bound(value: &str) -> Result<NaiveDate, ArgoError> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .map_err(|_| ArgoError::InvalidTimeRange(format!("unparseable date: {value}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub dpt_min: f64,
    pub dpt_max: f64,
    pub time: Option<TimeRange>,
}

impl RegionBox {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
        dpt_min: f64,
        dpt_max: f64,
        time: Option<TimeRange>,
    ) -> Result<Self, ArgoError> {
        for (name, min, max) in [
            ("lon", lon_min, lon_max),
            ("lat", lat_min, lat_max),
            ("dpt", dpt_min, dpt_max),
        ] {
            if !min.is_finite() || !max.is_finite() {
                return Err(ArgoError::InvalidRegion(format!(
                    "{name} bounds must be finite, got [{min}, {max}]"
                )));
            }
            if min > max {
                return Err(ArgoError::InvalidRegion(format!(
                    "{name} bounds are out of order: [{min}, {max}]"
                )));
            }
        }
        Ok(Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
            dpt_min,
            dpt_max,
            time,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestSpec {
    /// An empty cycle list means every cycle.
    Profile { wmo: Wmo, cycles: Vec<u32> },
    Float { wmos: Vec<Wmo> },
    Region(RegionBox),
}

impl RequestSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestSpec::Profile { .. } => "profile",
            RequestSpec::Float { .. } => "float",
            RequestSpec::Region(_) => "region",
        }
    }
}
