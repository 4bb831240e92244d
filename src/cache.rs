//! Filesystem-backed derivative cache.
//!
//! Encoding is the expensive part of serving a derivative: decoding a phone
//! photo and re-encoding it can take hundreds of milliseconds. This module
//! keeps every derivative the pipeline produces so repeat requests are a
//! single file read.
//!
//! # Design
//!
//! ## Keys and layout
//!
//! The cache directory is a flat namespace. Each entry is one file named by
//! its derivative key (see [`naming::derivative_key`](crate::naming::derivative_key)):
//!
//! ```text
//! cache/
//! ├── 1712345678901-123456789-w400-q85-mnull.jpg
//! ├── 1712345678901-123456789-w400-q85-m50.jpg
//! └── 1712345699999-555555555-wnull-q60-mnull.png
//! ```
//!
//! There is no manifest and no in-memory index. Existence on disk *is* the
//! index, so the cache survives restarts unchanged and can be wiped with
//! `rm -r` at any time.
//!
//! ## Concurrent writers
//!
//! Nothing locks the cache. Two requests for the same uncached key may both
//! run the pipeline and both call [`DerivativeCache::put`]. That is harmless
//! because the pipeline is deterministic (same original and parameters give
//! the same bytes) and `put` never writes in place: bytes go to a hidden
//! temp file first, then `rename` swaps it into position atomically. A reader
//! sees either no entry or a complete one, never a torn write.
//!
//! ## Limitations
//!
//! Entries are never evicted or invalidated. Originals are immutable, so
//! entries never go stale, but the directory grows without bound.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Disambiguates temp files from concurrent `put`s in this process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Cache write failed for {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),
}

/// Derivative store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct DerivativeCache {
    dir: PathBuf,
}

impl DerivativeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Path an entry for `key` lives at.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    /// Read the entry for `key`. A missing entry is `Ok(None)`, not an error.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// Store `bytes` under `key`, replacing any existing entry atomically.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp = self
            .dir
            .join(format!(".{key}.{}.{seq}.tmp", std::process::id()));

        let written = async {
            tokio::fs::write(&temp, bytes).await?;
            tokio::fs::rename(&temp, &path).await
        }
        .await;

        if let Err(source) = written {
            // The temp file may or may not exist depending on which step failed
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(CacheError::Write {
                key: key.to_string(),
                source,
            });
        }
        Ok(())
    }
}

/// Keys must name a single visible file directly inside the cache directory.
fn validate_key(key: &str) -> Result<(), CacheError> {
    let invalid = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
        || key.contains("..");
    if invalid {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Running totals of how media requests were answered.
///
/// Shared by every request task, hence atomics rather than `&mut self`.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    fallbacks: AtomicU64,
}

impl CacheStats {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A transform was attempted but the original was served instead.
    pub fn fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.hits() + self.misses() + self.fallbacks()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hits, misses, fallbacks) = (self.hits(), self.misses(), self.fallbacks());
        if fallbacks > 0 {
            write!(
                f,
                "{} cached, {} encoded, {} fell back ({} total)",
                hits,
                misses,
                fallbacks,
                self.total()
            )
        } else if hits > 0 {
            write!(f, "{} cached, {} encoded ({} total)", hits, misses, self.total())
        } else {
            write!(f, "{} encoded", misses)
        }
    }
}
