//! Chunked, cached fetching engine for Argo ocean float profile data.

pub mod backend;
pub mod cache;
pub mod chunk;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod uri;
