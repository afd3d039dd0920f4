use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use sha2::{Digest, Sha256};

use crate::error::ArgoError;

/// URI-keyed payload cache: one file per canonical URI under the root.
/// A disabled store fails every operation with `FileSystemHasNoCache`,
/// which callers must be able to tell apart from "cache empty".
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: Option<Utf8PathBuf>,
}

impl CacheStore {
    pub fn enabled(root: Option<Utf8PathBuf>) -> Result<Self, ArgoError> {
        let root = match root {
            Some(root) => root,
            None => default_root()?,
        };
        Ok(Self { root: Some(root) })
    }

    pub fn disabled() -> Self {
        Self { root: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    pub fn path_for(&self, uri: &str) -> Result<Utf8PathBuf, ArgoError> {
        let root = self.root.as_ref().ok_or(ArgoError::FileSystemHasNoCache)?;
        Ok(root.join(entry_name(uri)))
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.path_for(uri)
            .map(|path| path.as_std_path().exists())
            .unwrap_or(false)
    }

    pub fn lookup(&self, uri: &str) -> Result<Vec<u8>, ArgoError> {
        let path = self.path_for(uri)?;
        if !path.as_std_path().exists() {
            return Err(ArgoError::CacheFileNotFound(uri.to_string()));
        }
        fs::read(path.as_std_path()).map_err(|err| ArgoError::Filesystem(err.to_string()))
    }

    /// Idempotent overwrite; concurrent writers land on a unique temp
    /// file first, so the entry is never observed half-written.
    pub fn store(&self, uri: &str, payload: &[u8]) -> Result<(), ArgoError> {
        let root = self.root.as_ref().ok_or(ArgoError::FileSystemHasNoCache)?;
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| ArgoError::Filesystem(err.to_string()))?;
        let path = root.join(entry_name(uri));
        let mut temp = tempfile::Builder::new()
            .prefix("argofetch")
            .tempfile_in(root.as_std_path())
            .map_err(|err| ArgoError::Filesystem(err.to_string()))?;
        temp.write_all(payload)
            .map_err(|err| ArgoError::Filesystem(err.to_string()))?;
        remove_if_present(&path)?;
        temp.persist(path.as_std_path())
            .map_err(|err| ArgoError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn remove(&self, uri: &str) -> Result<(), ArgoError> {
        let path = self.path_for(uri)?;
        remove_if_present(&path)
    }

    /// Scoped clear: other fetchers' entries under the same root are
    /// untouched.
    pub fn clear(&self, uris: &[String]) -> Result<(), ArgoError> {
        for uri in uris {
            self.remove(uri)?;
        }
        Ok(())
    }
}

fn remove_if_present(path: &Utf8Path) -> Result<(), ArgoError> {
    match fs::remove_file(path.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ArgoError::Filesystem(err.to_string())),
    }
}

fn entry_name(uri: &str) -> String {
    format!("{:x}.json", Sha256::digest(uri.as_bytes()))
}

fn default_root() -> Result<Utf8PathBuf, ArgoError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("argofetch")).ok()
        })
        .ok_or_else(|| ArgoError::Filesystem("unable to resolve cache directory".to_string()))
}
