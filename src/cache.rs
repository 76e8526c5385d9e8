//! Content-addressed derivative cache.
//!
//! Encoding is the bottleneck of a build: a single source at four widths
//! plus a modern-format sibling is eight encodes. The cache lets the worker
//! pool skip all of them when the same derivative was produced before.
//!
//! # Design
//!
//! The cache is a plain directory. Each entry is a file named exactly like
//! the derivative it stands for (see [`naming`](crate::naming)), and that name
//! already encodes both the source content hash and the options hash. There is
//! therefore no manifest and no invalidation step: changing the source bytes or
//! any option produces a different name, i.e. a different entry. Entries are
//! never rewritten in place.
//!
//! - **Existence is the source of truth.** A present, non-empty file is a hit.
//!   A zero-byte file (left behind by a crashed writer on a filesystem without
//!   atomic rename, or by hand) counts as a miss and gets re-encoded.
//! - **Writes are atomic.** Every write goes to a temp file in the target
//!   directory, then renames over the final path. Two workers racing on the
//!   same path never expose a half-written file to a reader.
//! - **Cache I/O never fails a build.** Read or copy errors are reported to
//!   the caller, which logs them and falls back to encoding.
//!
//! ## Cache keys
//!
//! [`derive_cache_key`] hashes the source path, the content hash and the
//! canonical options query, then keeps the first [`CACHE_KEY_LEN`] hex chars.
//! Seven hex chars is 28 bits: enough to tell apart the derivatives of a site,
//! not enough to resist a deliberate collision. It identifies, it does not
//! authenticate.

use crate::naming::{OptionPair, options_query};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Length of short hashes (cache keys and file name option segments).
pub const CACHE_KEY_LEN: usize = 7;

/// SHA-256 of a byte slice, as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// First [`CACHE_KEY_LEN`] hex chars of the SHA-256 of `input`.
pub fn short_hash(input: &str) -> String {
    let mut hex = hash_bytes(input.as_bytes());
    hex.truncate(CACHE_KEY_LEN);
    hex
}

/// Stable short identifier of one (source, content, options) request.
///
/// `source_path` should be project-relative so keys survive moving the
/// project directory.
pub fn derive_cache_key(source_path: &str, content_hash: &str, pairs: &[OptionPair]) -> String {
    short_hash(&format!("{}{}{}", source_path, content_hash, options_query(pairs)))
}

/// Read a cache entry.
///
/// Returns `Ok(None)` when the entry is missing or empty; any other I/O error
/// is returned so the caller can log it.
pub fn read_cached(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether a usable (present, non-empty) entry exists at `path`.
pub fn is_cached(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Mode of every written derivative and cache entry. Temp files start out
/// owner-only; the output must be readable by a web server running as
/// another user.
#[cfg(unix)]
pub const FILE_MODE: u32 = 0o644;

/// Write `bytes` to `path` through a temp file and an atomic rename.
///
/// Parent directories are created as needed. On unix the file ends up with
/// [`FILE_MODE`].
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))?;
    }
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copy a cache entry to `dest`. Returns `Ok(false)` on a miss.
pub fn copy_cached(cache_path: &Path, dest: &Path) -> io::Result<bool> {
    match read_cached(cache_path)? {
        Some(bytes) => {
            write_atomic(dest, &bytes)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Summary of one worker pool run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Items served entirely from the cache.
    pub hits: u32,
    /// Items that went through the encoder.
    pub encoded: u32,
    /// Items that failed.
    pub failed: u32,
    /// Items never started because of fail-fast.
    pub skipped: u32,
    /// Cache reads/writes that failed and were worked around.
    pub cache_errors: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.encoded + self.failed + self.skipped
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.encoded,
                self.total()
            )?;
        } else {
            write!(f, "{} encoded", self.encoded)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.cache_errors > 0 {
            write!(f, ", {} cache errors", self.cache_errors)?;
        }
        Ok(())
    }
}
