use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use chrono::Months;

use argofetch::backend::DataBackend;
use argofetch::chunk::Dimension;
use argofetch::dataset::{Dataset, ProfileRecord};
use argofetch::domain::{RegionBox, RequestSpec, TimeRange, Wmo};
use argofetch::error::ArgoError;
use argofetch::executor::ParallelFlag;
use argofetch::fetcher::{DataFetcher, FetcherOptions};
use argofetch::uri::BackendParams;

#[derive(Clone)]
struct MockBackend {
    params: BackendParams,
    fetches: Arc<Mutex<Vec<String>>>,
    fail_uri_containing: Option<String>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            params: BackendParams {
                base_url: "https://argovis.test".to_string(),
                ..BackendParams::default()
            },
            fetches: Arc::new(Mutex::new(Vec::new())),
            fail_uri_containing: None,
        }
    }

    fn failing_on(needle: &str) -> Self {
        Self {
            fail_uri_containing: Some(needle.to_string()),
            ..Self::new()
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

impl DataBackend for MockBackend {
    fn params(&self) -> &BackendParams {
        &self.params
    }

    fn max_time_span(&self) -> Months {
        Months::new(3)
    }

    fn fetch(&self, uri: &str) -> Result<Vec<u8>, ArgoError> {
        self.fetches.lock().unwrap().push(uri.to_string());
        if let Some(needle) = &self.fail_uri_containing {
            if uri.contains(needle.as_str()) {
                return Err(ArgoError::RemoteStatus {
                    uri: uri.to_string(),
                    status: 500,
                    message: "mock server error".to_string(),
                });
            }
        }
        serde_json::to_vec(&payload_for(uri)).map_err(|err| ArgoError::RemoteHttp {
            uri: uri.to_string(),
            message: err.to_string(),
        })
    }

    fn decode(&self, uri: &str, payload: &[u8]) -> Result<Dataset, ArgoError> {
        serde_json::from_slice(payload).map_err(|err| ArgoError::Decode {
            uri: uri.to_string(),
            message: err.to_string(),
        })
    }
}

fn payload_for(uri: &str) -> Dataset {
    Dataset::new(
        vec!["pres".to_string(), "temp".to_string()],
        vec![ProfileRecord {
            wmo: "1901393".parse().unwrap(),
            cycle: uri.len() as u32,
            lon: -68.0,
            lat: 37.5,
            date: "2012-01-15T00:00:00Z".parse().unwrap(),
            levels: vec![vec![5.0, 3.5]],
        }],
    )
}

fn cached_options(dir: &std::path::Path) -> FetcherOptions {
    FetcherOptions {
        cachedir: Some(dir.to_str().unwrap().to_string()),
        cache: true,
        ..FetcherOptions::default()
    }
}

fn wmos(values: &[u32]) -> Vec<Wmo> {
    values
        .iter()
        .map(|value| value.to_string().parse().unwrap())
        .collect()
}

fn test_region() -> RegionBox {
    RegionBox::new(
        -70.0,
        -65.0,
        35.0,
        40.0,
        0.0,
        10.0,
        Some(TimeRange::parse("2012-01", "2012-03").unwrap()),
    )
    .unwrap()
}

#[test]
fn cachepath_not_found_before_any_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = DataFetcher::new(MockBackend::new(), cached_options(dir.path()))
        .unwrap()
        .profile("6902746".parse().unwrap(), vec![34])
        .unwrap();
    assert_matches!(fetcher.cachepath(), Err(ArgoError::CacheFileNotFound(_)));
}

#[test]
fn no_cache_cachepath_is_distinguishable() {
    let fetcher = DataFetcher::new(MockBackend::new(), FetcherOptions::default())
        .unwrap()
        .profile("6902746".parse().unwrap(), vec![34])
        .unwrap();
    fetcher.to_dataset().unwrap();
    assert_matches!(fetcher.cachepath(), Err(ArgoError::FileSystemHasNoCache));
}

#[test]
fn clear_cache_resets_cachepath() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = DataFetcher::new(MockBackend::new(), cached_options(dir.path()))
        .unwrap()
        .float(wmos(&[6902746]))
        .unwrap();
    fetcher.to_dataset().unwrap();

    let paths = fetcher.cachepath().unwrap();
    assert!(!paths.is_empty());
    assert!(paths.iter().all(|path| path.as_std_path().exists()));

    fetcher.clear_cache().unwrap();
    assert!(paths.iter().all(|path| !path.as_std_path().exists()));
    assert_matches!(fetcher.cachepath(), Err(ArgoError::CacheFileNotFound(_)));
}

#[test]
fn second_call_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let fetcher = DataFetcher::new(backend.clone(), cached_options(dir.path()))
        .unwrap()
        .float(wmos(&[1901393]))
        .unwrap();

    let first = fetcher.to_dataset().unwrap();
    let fetched_once = backend.fetch_count();
    assert_eq!(fetched_once, fetcher.uri().len());

    let second = fetcher.to_dataset().unwrap();
    assert_eq!(backend.fetch_count(), fetched_once);
    assert_eq!(first, second);
    assert!(!fetcher.cachepath().unwrap().is_empty());
}

#[test]
fn region_chunk_count_matches_configured_product() {
    let options = FetcherOptions {
        chunks: BTreeMap::from([
            (Dimension::Lon, 1),
            (Dimension::Lat, 2),
            (Dimension::Dpt, 1),
            (Dimension::Time, 2),
        ]),
        ..FetcherOptions::default()
    };
    let fetcher = DataFetcher::new(MockBackend::new(), options)
        .unwrap()
        .region(test_region())
        .unwrap();

    assert_eq!(fetcher.uri().len(), 4);
    assert_eq!(fetcher.chunks().len(), 4);

    let dataset = fetcher.to_dataset().unwrap();
    assert_eq!(dataset.len(), 4);
}

#[test]
fn wmo_maxsize_one_yields_one_chunk_per_float() {
    let floats = [6902766, 6902772, 6902914];
    let options = FetcherOptions {
        chunks_maxsize: BTreeMap::from([(Dimension::Wmo, 1.0)]),
        ..FetcherOptions::default()
    };
    let fetcher = DataFetcher::new(MockBackend::new(), options)
        .unwrap()
        .float(wmos(&floats))
        .unwrap();

    assert_eq!(fetcher.uri().len(), floats.len());
    for (chunk, &expected) in fetcher.chunks().iter().zip(floats.iter()) {
        assert_matches!(chunk, RequestSpec::Float { wmos } if wmos.len() == 1
            && wmos[0].as_u32() == expected);
    }
}

#[test]
fn parallel_and_sequential_agree() {
    let chunked = |parallel: Option<ParallelFlag>| FetcherOptions {
        parallel,
        chunks: BTreeMap::from([(Dimension::Lat, 2), (Dimension::Time, 2)]),
        ..FetcherOptions::default()
    };

    let sequential = DataFetcher::new(MockBackend::new(), chunked(None))
        .unwrap()
        .region(test_region())
        .unwrap();
    let threaded = DataFetcher::new(
        MockBackend::new(),
        chunked(Some(ParallelFlag::Method("thread".to_string()))),
    )
    .unwrap()
    .region(test_region())
    .unwrap();

    assert_eq!(sequential.uri(), threaded.uri());
    assert_eq!(
        sequential.to_dataset().unwrap(),
        threaded.to_dataset().unwrap()
    );
}

#[test]
fn invalid_parallel_methods_fail_at_construction() {
    let cases = [
        FetcherOptions {
            parallel: Some(ParallelFlag::Method("process".to_string())),
            ..FetcherOptions::default()
        },
        FetcherOptions {
            parallel: Some(ParallelFlag::Enabled(true)),
            parallel_method: Some("process".to_string()),
            ..FetcherOptions::default()
        },
        FetcherOptions {
            parallel: Some(ParallelFlag::Enabled(true)),
            parallel_method: Some("toto".to_string()),
            ..FetcherOptions::default()
        },
    ];
    for options in cases {
        assert_matches!(
            DataFetcher::new(MockBackend::new(), options),
            Err(ArgoError::InvalidParallelMethod(_))
        );
    }
}

#[test]
fn long_time_range_is_chunked_without_configuration() {
    let region = RegionBox::new(
        -70.0,
        -65.0,
        35.0,
        40.0,
        0.0,
        10.0,
        Some(TimeRange::parse("2012-01", "2012-06").unwrap()),
    )
    .unwrap();
    let fetcher = DataFetcher::new(MockBackend::new(), FetcherOptions::default())
        .unwrap()
        .region(region)
        .unwrap();

    assert!(fetcher.uri().len() > 1);
    for chunk in fetcher.chunks() {
        let range = match chunk {
            RequestSpec::Region(region) => region.time.unwrap(),
            other => panic!("unexpected chunk kind: {other:?}"),
        };
        let limit = range.start.checked_add_months(Months::new(3)).unwrap();
        assert!(range.end <= limit, "chunk exceeds the 3-month cap: {range:?}");
    }
}

#[test]
fn strict_merge_surfaces_remote_failure() {
    let backend = MockBackend::failing_on("wmo=6902772");
    let options = FetcherOptions {
        chunks_maxsize: BTreeMap::from([(Dimension::Wmo, 1.0)]),
        ..FetcherOptions::default()
    };
    let fetcher = DataFetcher::new(backend, options)
        .unwrap()
        .float(wmos(&[6902766, 6902772]))
        .unwrap();
    assert_matches!(
        fetcher.to_dataset(),
        Err(ArgoError::RemoteStatus { status: 500, .. })
    );
}

#[test]
fn non_strict_merge_returns_partial_results() {
    let backend = MockBackend::failing_on("wmo=6902772");
    let options = FetcherOptions {
        chunks_maxsize: BTreeMap::from([(Dimension::Wmo, 1.0)]),
        strict: false,
        ..FetcherOptions::default()
    };
    let fetcher = DataFetcher::new(backend, options)
        .unwrap()
        .float(wmos(&[6902766, 6902772]))
        .unwrap();
    let dataset = fetcher.to_dataset().unwrap();
    assert_eq!(dataset.len(), 1);
}

#[test]
fn uri_lists_are_deterministic() {
    let build = || {
        DataFetcher::new(MockBackend::new(), FetcherOptions::default())
            .unwrap()
            .region(test_region())
            .unwrap()
    };
    assert_eq!(build().uri(), build().uri());
}

#[test]
fn empty_float_list_is_rejected() {
    assert_matches!(
        DataFetcher::new(MockBackend::new(), FetcherOptions::default())
            .unwrap()
            .float(Vec::new()),
        Err(ArgoError::InvalidWmo(_))
    );
}
