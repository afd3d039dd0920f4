use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months};
use serde::{Deserialize, Serialize};

use crate::domain::{RegionBox, RequestSpec, TimeRange, Wmo};
use crate::error::ArgoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Lon,
    Lat,
    Dpt,
    Time,
    Wmo,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Lon => "lon",
            Dimension::Lat => "lat",
            Dimension::Dpt => "dpt",
            Dimension::Time => "time",
            Dimension::Wmo => "wmo",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Dimension {
    type Err = ArgoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "lon" => Ok(Dimension::Lon),
            "lat" => Ok(Dimension::Lat),
            "dpt" => Ok(Dimension::Dpt),
            "time" => Ok(Dimension::Time),
            "wmo" => Ok(Dimension::Wmo),
            other => Err(ArgoError::InvalidChunkingConfig(format!(
                "unrecognized dimension: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkPolicy {
    Count(usize),
    /// Degrees or meters for spatial dimensions, days for time,
    /// identifiers per group for wmo.
    MaxSize(f64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkingConfig {
    policies: BTreeMap<Dimension, ChunkPolicy>,
}

impl ChunkingConfig {
    /// A dimension may appear in `chunks` or `chunks_maxsize`, not both.
    pub fn resolve(
        chunks: &BTreeMap<Dimension, usize>,
        maxsizes: &BTreeMap<Dimension, f64>,
    ) -> Result<Self, ArgoError> {
        let mut policies = BTreeMap::new();
        for (&dim, &count) in chunks {
            if count == 0 {
                return Err(ArgoError::InvalidChunkingConfig(format!(
                    "chunk count for {dim} must be positive"
                )));
            }
            policies.insert(dim, ChunkPolicy::Count(count));
        }
        for (&dim, &size) in maxsizes {
            if !(size > 0.0) {
                return Err(ArgoError::InvalidChunkingConfig(format!(
                    "chunk maxsize for {dim} must be positive, got {size}"
                )));
            }
            if policies.contains_key(&dim) {
                return Err(ArgoError::InvalidChunkingConfig(format!(
                    "{dim} is configured with both a chunk count and a chunk maxsize"
                )));
            }
            policies.insert(dim, ChunkPolicy::MaxSize(size));
        }
        Ok(Self { policies })
    }

    pub fn policy(&self, dim: Dimension) -> Option<ChunkPolicy> {
        self.policies.get(&dim).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Decompose a request into an ordered, never-empty sequence of
/// sub-requests. Region chunks are the Cartesian product of the
/// per-dimension splits, ordered lon, lat, dpt, time, lowest bound first.
pub fn chunk_request(
    spec: &RequestSpec,
    config: &ChunkingConfig,
    max_time_span: Months,
) -> Result<Vec<RequestSpec>, ArgoError> {
    let chunks = match spec {
        RequestSpec::Profile { .. } => vec![spec.clone()],
        RequestSpec::Float { wmos } => chunk_wmo_list(wmos, config.policy(Dimension::Wmo)),
        RequestSpec::Region(region) => chunk_region(region, config, max_time_span),
    };
    tracing::debug!(kind = spec.kind(), count = chunks.len(), "chunked request");
    Ok(chunks)
}

fn chunk_wmo_list(wmos: &[Wmo], policy: Option<ChunkPolicy>) -> Vec<RequestSpec> {
    let groups: Vec<Vec<Wmo>> = match policy {
        None => vec![wmos.to_vec()],
        Some(ChunkPolicy::MaxSize(size)) => {
            let per_group = (size.ceil() as usize).max(1);
            wmos.chunks(per_group).map(|group| group.to_vec()).collect()
        }
        Some(ChunkPolicy::Count(count)) => {
            let count = count.clamp(1, wmos.len().max(1));
            let base = wmos.len() / count;
            let extra = wmos.len() % count;
            let mut groups = Vec::with_capacity(count);
            let mut offset = 0;
            for index in 0..count {
                let take = base + usize::from(index < extra);
                groups.push(wmos[offset..offset + take].to_vec());
                offset += take;
            }
            groups
        }
    };
    groups
        .into_iter()
        .map(|wmos| RequestSpec::Float { wmos })
        .collect()
}

fn chunk_region(
    region: &RegionBox,
    config: &ChunkingConfig,
    max_time_span: Months,
) -> Vec<RequestSpec> {
    let lon_bins = split_axis(region.lon_min, region.lon_max, config.policy(Dimension::Lon));
    let lat_bins = split_axis(region.lat_min, region.lat_max, config.policy(Dimension::Lat));
    let dpt_bins = split_axis(region.dpt_min, region.dpt_max, config.policy(Dimension::Dpt));
    let time_bins: Vec<Option<TimeRange>> = match (&region.time, config.policy(Dimension::Time)) {
        (Some(range), policy) => split_time(range, policy, max_time_span)
            .into_iter()
            .map(Some)
            .collect(),
        (None, Some(_)) => {
            tracing::warn!("time chunking configured on a region without time bounds; ignored");
            vec![None]
        }
        (None, None) => vec![None],
    };

    let mut chunks =
        Vec::with_capacity(lon_bins.len() * lat_bins.len() * dpt_bins.len() * time_bins.len());
    for &(lon_min, lon_max) in &lon_bins {
        for &(lat_min, lat_max) in &lat_bins {
            for &(dpt_min, dpt_max) in &dpt_bins {
                for &time in &time_bins {
                    chunks.push(RequestSpec::Region(RegionBox {
                        lon_min,
                        lon_max,
                        lat_min,
                        lat_max,
                        dpt_min,
                        dpt_max,
                        time,
                    }));
                }
            }
        }
    }
    chunks
}

fn split_axis(min: f64, max: f64, policy: Option<ChunkPolicy>) -> Vec<(f64, f64)> {
    let count = match policy {
        None => 1,
        Some(ChunkPolicy::Count(count)) => count,
        Some(ChunkPolicy::MaxSize(size)) => {
            let width = max - min;
            if width <= 0.0 {
                1
            } else {
                ((width / size).ceil() as usize).max(1)
            }
        }
    };
    if count <= 1 {
        return vec![(min, max)];
    }
    let width = (max - min) / count as f64;
    let mut bins = Vec::with_capacity(count);
    for index in 0..count {
        let lo = if index == 0 {
            min
        } else {
            min + width * index as f64
        };
        // pin the final boundary so rounding never shrinks the parent box
        let hi = if index == count - 1 {
            max
        } else {
            min + width * (index + 1) as f64
        };
        bins.push((lo, hi));
    }
    bins
}

fn split_time(range: &TimeRange, policy: Option<ChunkPolicy>, cap: Months) -> Vec<TimeRange> {
    let base = match policy {
        None => vec![*range],
        Some(ChunkPolicy::Count(count)) => split_time_count(range, count),
        Some(ChunkPolicy::MaxSize(days)) => {
            let total = range.num_days();
            let count = if total <= 0 {
                1
            } else {
                ((total as f64 / days).ceil() as usize).max(1)
            };
            split_time_count(range, count)
        }
    };
    base.into_iter()
        .flat_map(|bin| enforce_time_cap(bin, cap))
        .collect()
}

fn split_time_count(range: &TimeRange, count: usize) -> Vec<TimeRange> {
    if count <= 1 {
        return vec![*range];
    }
    let total = range.num_days();
    let mut bins = Vec::with_capacity(count);
    for index in 0..count {
        let lo = if index == 0 {
            range.start
        } else {
            range.start + Duration::days(total * index as i64 / count as i64)
        };
        let hi = if index == count - 1 {
            range.end
        } else {
            range.start + Duration::days(total * (index as i64 + 1) / count as i64)
        };
        bins.push(TimeRange { start: lo, end: hi });
    }
    bins
}

fn enforce_time_cap(range: TimeRange, cap: Months) -> Vec<TimeRange> {
    let mut bins = Vec::new();
    let mut cursor = range.start;
    loop {
        match cursor.checked_add_months(cap) {
            Some(limit) if limit < range.end => {
                bins.push(TimeRange {
                    start: cursor,
                    end: limit,
                });
                cursor = limit;
            }
            _ => {
                bins.push(TimeRange {
                    start: cursor,
                    end: range.end,
                });
                break;
            }
        }
    }
    bins
}
