use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::DataBackend;
use crate::cache::CacheStore;
use crate::dataset::Dataset;
use crate::domain::RequestSpec;
use crate::error::ArgoError;

/// The user-facing `parallel` option, a plain switch or a method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParallelFlag {
    Enabled(bool),
    Method(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Sequential,
    Thread,
}

const MAX_WORKERS: usize = 8;

/// A method string is validated even when parallel execution is off, so
/// a bad configuration never survives construction.
pub fn resolve_strategy(
    parallel: Option<&ParallelFlag>,
    parallel_method: Option<&str>,
) -> Result<FetchStrategy, ArgoError> {
    if let Some(method) = parallel_method {
        validate_method(method)?;
    }
    match parallel {
        None | Some(ParallelFlag::Enabled(false)) => Ok(FetchStrategy::Sequential),
        Some(ParallelFlag::Enabled(true)) => Ok(FetchStrategy::Thread),
        Some(ParallelFlag::Method(method)) => {
            validate_method(method)?;
            Ok(FetchStrategy::Thread)
        }
    }
}

fn validate_method(method: &str) -> Result<(), ArgoError> {
    match method {
        "thread" => Ok(()),
        "process" => Err(ArgoError::InvalidParallelMethod(
            "process-based execution is not supported".to_string(),
        )),
        other => Err(ArgoError::InvalidParallelMethod(format!(
            "unrecognized parallel method: {other}"
        ))),
    }
}

#[derive(Debug)]
pub struct ChunkFetch {
    pub chunk: RequestSpec,
    pub uri: String,
    pub payload: Result<Dataset, ArgoError>,
}

/// Results come back in chunk order regardless of completion order;
/// per-chunk failures are captured in the rows, never raised here.
pub fn execute<B: DataBackend>(
    chunks: &[RequestSpec],
    uris: &[String],
    backend: &B,
    cache: &CacheStore,
    strategy: FetchStrategy,
) -> Vec<ChunkFetch> {
    match strategy {
        FetchStrategy::Sequential => chunks
            .iter()
            .zip(uris.iter())
            .map(|(chunk, uri)| fetch_one(chunk, uri, backend, cache))
            .collect(),
        FetchStrategy::Thread => {
            let workers = chunks.len().clamp(1, MAX_WORKERS);
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| {
                    chunks
                        .par_iter()
                        .zip(uris.par_iter())
                        .map(|(chunk, uri)| fetch_one(chunk, uri, backend, cache))
                        .collect()
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "thread pool unavailable, running sequentially");
                    execute(chunks, uris, backend, cache, FetchStrategy::Sequential)
                }
            }
        }
    }
}

fn fetch_one<B: DataBackend>(
    chunk: &RequestSpec,
    uri: &str,
    backend: &B,
    cache: &CacheStore,
) -> ChunkFetch {
    let payload = match cache.lookup(uri) {
        Ok(bytes) => {
            tracing::debug!(uri, "cache hit");
            backend.decode(uri, &bytes)
        }
        Err(ArgoError::CacheFileNotFound(_)) | Err(ArgoError::FileSystemHasNoCache) => {
            tracing::debug!(uri, "cache miss");
            backend.fetch(uri).and_then(|bytes| {
                // only payloads that decode get cached
                let dataset = backend.decode(uri, &bytes)?;
                match cache.store(uri, &bytes) {
                    Ok(()) | Err(ArgoError::FileSystemHasNoCache) => {}
                    // a cache fault must not discard a successful fetch
                    Err(err) => tracing::warn!(uri, error = %err, "failed to cache payload"),
                }
                Ok(dataset)
            })
        }
        Err(err) => Err(err),
    };
    ChunkFetch {
        chunk: chunk.clone(),
        uri: uri.to_string(),
        payload,
    }
}
