//! # diary-media
//!
//! Media serving for the diary app, with on-demand image derivatives.
//! Uploaded originals are immutable files in a directory. A request for one
//! of them may carry transform parameters (`w`, `q`, `maxSize`); when it
//! does, the server answers with a resized and re-encoded derivative
//! instead, and keeps that derivative on disk for the next identical request.
//!
//! # Request Flow
//!
//! ```text
//! GET /uploads/photo.jpg?w=400
//!     │
//!     ├─ not an image / no parameters / original missing ──→ original file
//!     │
//!     ├─ key = photo-w400-q85-mnull.jpg
//!     ├─ cache hit  ──────────────────────────────────────→ cached bytes
//!     └─ cache miss → decode → resize → encode (→ quality ladder)
//!                   → write cache → derivative bytes
//!
//!     any failure along the way ──────────────────────────→ original file
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`format`] | Media classification by extension, output codec selection |
//! | [`naming`] | Derivative cache keys and safe request filenames |
//! | [`imaging`] | Decode, resize, encode, and the size-bounded quality ladder |
//! | [`process`] | Bounded pool running transforms off the async runtime |
//! | [`cache`] | Filesystem derivative cache with atomic writes, request stats |
//! | [`serve`] | Axum middleware in front of the static originals, server loop |
//! | [`config`] | `diary-media.toml` loading, validation, merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Filesystem Is the Index
//!
//! The cache has no manifest and no in-memory map. A derivative exists if and
//! only if its key exists as a file in the cache directory. Restarts lose
//! nothing, and `rm -r` on the cache directory is always a safe reset.
//!
//! ## Fallback Over Failure
//!
//! A media request never fails because of the derivative machinery. Corrupt
//! originals, unsupported formats, full disks and panicking decoders all end
//! the same way: the original file is served as if no parameters were given.
//!
//! ## Bounded CPU Fan-Out
//!
//! Decoding and encoding run on tokio's blocking pool, gated by a semaphore
//! sized to the configured worker count. A burst of uncached requests queues
//! instead of starting one encode per request.

pub mod cache;
pub mod config;
pub mod format;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod serve;

#[cfg(test)]
pub(crate) mod test_helpers;
