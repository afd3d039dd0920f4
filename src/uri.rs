use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{RequestSpec, Wmo};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    #[default]
    Phy,
    Bgc,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Phy => write!(f, "phy"),
            DatasetKind::Bgc => write!(f, "bgc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendParams {
    pub base_url: String,
    pub dataset: DatasetKind,
}

impl Default for BackendParams {
    fn default() -> Self {
        Self {
            base_url: "https://argovis.colorado.edu".to_string(),
            dataset: DatasetKind::Phy,
        }
    }
}

/// Serialize a chunk into its canonical request URI. Fields appear in a
/// fixed order so structurally equal chunks always yield identical
/// strings; the output doubles as the cache key.
pub fn build(chunk: &RequestSpec, params: &BackendParams) -> String {
    let base = params.base_url.trim_end_matches('/');
    match chunk {
        RequestSpec::Profile { wmo, cycles } => {
            if cycles.is_empty() {
                format!("{base}/profiles/{wmo}?ds={}", params.dataset)
            } else {
                format!(
                    "{base}/profiles/{wmo}?cyc={}&ds={}",
                    join_numbers(cycles.iter()),
                    params.dataset
                )
            }
        }
        RequestSpec::Float { wmos } => {
            format!(
                "{base}/platforms?wmo={}&ds={}",
                join_wmos(wmos),
                params.dataset
            )
        }
        RequestSpec::Region(region) => {
            let mut uri = format!(
                "{base}/selection?lon_min={}&lon_max={}&lat_min={}&lat_max={}&dpt_min={}&dpt_max={}",
                region.lon_min,
                region.lon_max,
                region.lat_min,
                region.lat_max,
                region.dpt_min,
                region.dpt_max,
            );
            if let Some(range) = &region.time {
                uri.push_str(&format!(
                    "&start={}&end={}",
                    range.start.format("%Y-%m-%d"),
                    range.end.format("%Y-%m-%d")
                ));
            }
            uri.push_str(&format!("&ds={}", params.dataset));
            uri
        }
    }
}

fn join_numbers<'a>(values: impl Iterator<Item = &'a u32>) -> String {
    values
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn join_wmos(wmos: &[Wmo]) -> String {
    wmos.iter()
        .map(|wmo| wmo.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use crate::domain::{RegionBox, TimeRange};

    use super::*;

    fn params() -> BackendParams {
        BackendParams::default()
    }

    #[test]
    fn profile_uri_with_cycles() {
        let chunk = RequestSpec::Profile {
            wmo: "6902746".parse().unwrap(),
            cycles: vec![1, 12],
        };
        assert_eq!(
            build(&chunk, &params()),
            "https://argovis.colorado.edu/profiles/6902746?cyc=1,12&ds=phy"
        );
    }

    #[test]
    fn profile_uri_without_cycles() {
        let chunk = RequestSpec::Profile {
            wmo: "6902746".parse().unwrap(),
            cycles: vec![],
        };
        assert_eq!(
            build(&chunk, &params()),
            "https://argovis.colorado.edu/profiles/6902746?ds=phy"
        );
    }

    #[test]
    fn float_uri_preserves_wmo_order() {
        let chunk = RequestSpec::Float {
            wmos: vec!["6902772".parse().unwrap(), "6902766".parse().unwrap()],
        };
        assert_eq!(
            build(&chunk, &params()),
            "https://argovis.colorado.edu/platforms?wmo=6902772,6902766&ds=phy"
        );
    }

    #[test]
    fn region_uri_field_order_is_fixed() {
        let region = RegionBox::new(
            -70.0,
            -65.0,
            35.0,
            40.0,
            0.0,
            10.0,
            Some(TimeRange::parse("2012-01", "2012-03").unwrap()),
        )
        .unwrap();
        assert_eq!(
            build(&RequestSpec::Region(region), &params()),
            "https://argovis.colorado.edu/selection?lon_min=-70&lon_max=-65&lat_min=35&lat_max=40&dpt_min=0&dpt_max=10&start=2012-01-01&end=2012-03-01&ds=phy"
        );
    }

    #[test]
    fn equal_chunks_yield_equal_uris() {
        let region =
            RegionBox::new(-60.0, -55.0, 40.0, 45.0, 0.0, 10.0, None).unwrap();
        let a = build(&RequestSpec::Region(region), &params());
        let b = build(&RequestSpec::Region(region), &params());
        assert_eq!(a, b);
    }

    #[test]
    fn dataset_kind_enters_the_uri() {
        let chunk = RequestSpec::Float {
            wmos: vec!["1901393".parse().unwrap()],
        };
        let bgc = BackendParams {
            dataset: DatasetKind::Bgc,
            ..BackendParams::default()
        };
        assert!(build(&chunk, &bgc).ends_with("&ds=bgc"));
        assert_ne!(build(&chunk, &bgc), build(&chunk, &params()));
    }
}
