use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::backend::{ArgovisBackend, DataBackend};
use crate::cache::CacheStore;
use crate::chunk::{ChunkingConfig, Dimension, chunk_request};
use crate::dataset::{Dataset, merge};
use crate::domain::{RegionBox, RequestSpec, Wmo};
use crate::error::ArgoError;
use crate::executor::{FetchStrategy, ParallelFlag, execute, resolve_strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherOptions {
    pub cachedir: Option<String>,
    pub cache: bool,
    pub parallel: Option<ParallelFlag>,
    pub parallel_method: Option<String>,
    pub chunks: BTreeMap<Dimension, usize>,
    pub chunks_maxsize: BTreeMap<Dimension, f64>,
    pub strict: bool,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            cachedir: None,
            cache: false,
            parallel: None,
            parallel_method: None,
            chunks: BTreeMap::new(),
            chunks_maxsize: BTreeMap::new(),
            strict: true,
        }
    }
}

impl FetcherOptions {
    pub fn from_file(path: &str) -> Result<Self, ArgoError> {
        let path = PathBuf::from(path);
        let content =
            fs::read_to_string(&path).map_err(|_| ArgoError::OptionsRead(path.clone()))?;
        serde_json::from_str(&content).map_err(|err| ArgoError::OptionsParse(err.to_string()))
    }
}

/// Parallel-method and chunking validation happen at construction,
/// before any chunk or URI exists.
pub struct DataFetcher<B: DataBackend> {
    backend: B,
    cache: CacheStore,
    strategy: FetchStrategy,
    chunking: ChunkingConfig,
    strict: bool,
}

impl DataFetcher<ArgovisBackend> {
    pub fn argovis(options: FetcherOptions) -> Result<Self, ArgoError> {
        Self::new(ArgovisBackend::new()?, options)
    }
}

impl<B: DataBackend> DataFetcher<B> {
    pub fn new(backend: B, options: FetcherOptions) -> Result<Self, ArgoError> {
        let strategy = resolve_strategy(options.parallel.as_ref(), options.parallel_method.as_deref())?;
        let chunking = ChunkingConfig::resolve(&options.chunks, &options.chunks_maxsize)?;
        let cache = if options.cache {
            CacheStore::enabled(options.cachedir.map(Utf8PathBuf::from))?
        } else {
            CacheStore::disabled()
        };
        Ok(Self {
            backend,
            cache,
            strategy,
            chunking,
            strict: options.strict,
        })
    }

    pub fn profile(self, wmo: Wmo, cycles: Vec<u32>) -> Result<Fetcher<B>, ArgoError> {
        self.bind(RequestSpec::Profile { wmo, cycles })
    }

    pub fn float(self, wmos: Vec<Wmo>) -> Result<Fetcher<B>, ArgoError> {
        if wmos.is_empty() {
            return Err(ArgoError::InvalidWmo(
                "float request needs at least one identifier".to_string(),
            ));
        }
        self.bind(RequestSpec::Float { wmos })
    }

    pub fn region(self, region: RegionBox) -> Result<Fetcher<B>, ArgoError> {
        self.bind(RequestSpec::Region(region))
    }

    fn bind(self, spec: RequestSpec) -> Result<Fetcher<B>, ArgoError> {
        let chunks = chunk_request(&spec, &self.chunking, self.backend.max_time_span())?;
        let uris = chunks.iter().map(|chunk| self.backend.uri(chunk)).collect();
        Ok(Fetcher {
            backend: self.backend,
            cache: self.cache,
            strategy: self.strategy,
            strict: self.strict,
            chunks,
            uris,
        })
    }
}

/// A fetcher bound to one decomposed request; the chunk and URI lists
/// are fixed before any fetch happens.
pub struct Fetcher<B: DataBackend> {
    backend: B,
    cache: CacheStore,
    strategy: FetchStrategy,
    strict: bool,
    chunks: Vec<RequestSpec>,
    uris: Vec<String>,
}

impl<B: DataBackend> Fetcher<B> {
    /// Blocks until every chunk completed or failed.
    pub fn to_dataset(&self) -> Result<Dataset, ArgoError> {
        let results = execute(
            &self.chunks,
            &self.uris,
            &self.backend,
            &self.cache,
            self.strategy,
        );
        merge(
            results.into_iter().map(|result| result.payload).collect(),
            self.strict,
        )
    }

    /// The canonical URIs this fetcher will request, in chunk order.
    pub fn uri(&self) -> &[String] {
        &self.uris
    }

    pub fn chunks(&self) -> &[RequestSpec] {
        &self.chunks
    }

    /// Fails with `FileSystemHasNoCache` when caching is disabled and
    /// `CacheFileNotFound` when enabled but nothing is cached yet.
    pub fn cachepath(&self) -> Result<Vec<Utf8PathBuf>, ArgoError> {
        let mut paths = Vec::new();
        for uri in &self.uris {
            let path = self.cache.path_for(uri)?;
            if path.as_std_path().exists() {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(ArgoError::CacheFileNotFound(
                self.uris.first().cloned().unwrap_or_default(),
            ));
        }
        Ok(paths)
    }

    /// Drop the cache entries for this fetcher's URIs only.
    pub fn clear_cache(&self) -> Result<(), ArgoError> {
        self.cache.clear(&self.uris)
    }
}
