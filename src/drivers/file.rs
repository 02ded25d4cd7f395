//! Filesystem driver with an in-process front tier.
//!
//! Layout: `<root>/<2 hex>/<32 hex>.cache`, where the hex name is the first
//! 16 bytes of `sha256(prefix + key)`. The two-character shard keeps
//! directory fan-out bounded for large key spaces.
//!
//! Reads check the bounded memory tier (L1) before touching disk; writes
//! update L1 first and then persist under an exclusive file lock. L1 evicts
//! the oldest-written entry once it reaches `memory_limit`.
//!
//! Read-modify-write sequences (`increment`, `remember`) are not protected
//! across processes; concurrent increments from two processes can lose an
//! update.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::CacheDriver;
use crate::cache::codec::{decode_record, encode_record, Record};
use crate::cache::entry::{self, resolve_ttl, CacheEntry};
use crate::cache::CacheValue;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::metrics;

const DRIVER: &str = "file";
const EXTENSION: &str = "cache";
/// Memoized key → path mappings kept before the memo is reset.
const PATH_MEMO_LIMIT: usize = 10_000;

pub struct FileCache {
    root: PathBuf,
    prefix: String,
    default_ttl: Option<u64>,
    /// L1 tier. Reads use `peek`, so only writes refresh an entry's position.
    memory: Mutex<LruCache<String, CacheEntry>>,
    paths: Mutex<HashMap<String, PathBuf>>,
}

impl FileCache {
    /// Prepare `root` (creating it if needed) and build the driver.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Directory` if the root cannot be created, is not
    /// a directory, or is not writable.
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        default_ttl: Option<u64>,
        memory_limit: usize,
    ) -> Result<Self> {
        let root = root.into();
        Self::ensure_root(&root)?;

        let capacity = NonZeroUsize::new(memory_limit).unwrap_or(NonZeroUsize::MIN);
        debug!(
            "File cache ready at {} (memory tier: {} entries)",
            root.display(),
            capacity
        );

        Ok(Self {
            root,
            prefix: prefix.into(),
            default_ttl,
            memory: Mutex::new(LruCache::new(capacity)),
            paths: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(
            config.path.clone(),
            config.prefix.clone(),
            config.ttl,
            config.memory_limit,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries currently held in the memory tier.
    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    fn ensure_root(root: &Path) -> Result<()> {
        fs::create_dir_all(root).map_err(|e| CacheError::directory(root, e))?;

        let metadata = fs::metadata(root).map_err(|e| CacheError::directory(root, e))?;
        if !metadata.is_dir() {
            return Err(CacheError::directory(root, "not a directory"));
        }

        // Probe with a real write; permission bits alone miss ACLs and
        // read-only mounts.
        let probe = root.join(format!(".probe-{}", uuid::Uuid::new_v4()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&probe)
            .map_err(|e| CacheError::directory(root, format!("not writable: {}", e)))?;
        let _ = fs::remove_file(&probe);

        Ok(())
    }

    /// `<root>/<shard>/<hash>.cache`, memoized per key.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut paths = self.paths.lock();
        if let Some(path) = paths.get(key) {
            return path.clone();
        }

        let mut hasher = Sha256::new();
        hasher.update(self.prefix.as_bytes());
        hasher.update(key.as_bytes());
        let hash = hex::encode(&hasher.finalize()[..16]);
        let path = self
            .root
            .join(&hash[..2])
            .join(format!("{}.{}", hash, EXTENSION));

        if paths.len() >= PATH_MEMO_LIMIT {
            paths.clear();
        }
        paths.insert(key.to_string(), path.clone());
        path
    }

    fn remember_in_memory(&self, key: &str, entry: CacheEntry) {
        let mut memory = self.memory.lock();
        if let Some((evicted, _)) = memory.push(key.to_string(), entry) {
            if evicted != key {
                debug!("Evicted {} from memory tier", evicted);
                metrics::record_eviction(DRIVER);
            }
        }
        metrics::update_memory_entries(DRIVER, memory.len());
    }

    fn forget_in_memory(&self, key: &str) {
        let mut memory = self.memory.lock();
        memory.pop(key);
        metrics::update_memory_entries(DRIVER, memory.len());
    }

    /// Live entry for `key` from L1 or disk. Expired or malformed records
    /// are deleted on the way.
    fn load(&self, key: &str) -> Option<CacheEntry> {
        let now = entry::now();

        {
            let mut memory = self.memory.lock();
            if let Some(cached) = memory.peek(key) {
                if cached.is_live(now) {
                    return Some(cached.clone());
                }
                memory.pop(key);
            }
        }

        let path = self.path_for(key);
        let bytes = match read_locked(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache file {}: {}", path.display(), e);
                return None;
            }
        };

        let record = match decode_record(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!("Discarding corrupt cache file {}: {}", path.display(), e);
                self.delete(key);
                return None;
            }
        };

        let entry = record.into_entry();
        if !entry.is_live(now) {
            debug!("Expired cache file removed: {}", path.display());
            self.delete(key);
            metrics::record_expired(DRIVER, 1);
            return None;
        }

        self.remember_in_memory(key, entry.clone());
        Some(entry)
    }

    /// Update L1, then persist. Returns whether the file write succeeded.
    fn store(&self, key: &str, entry: CacheEntry) -> bool {
        let record = Record::from_entry(&entry, &self.prefix);
        self.remember_in_memory(key, entry);

        let path = self.path_for(key);
        let result = encode_record(&record).and_then(|bytes| {
            write_locked(&path, &bytes).map_err(CacheError::from)
        });

        match result {
            Ok(()) => {
                metrics::record_write(DRIVER, true);
                true
            }
            Err(e) => {
                warn!("Failed to write cache file {}: {}", path.display(), e);
                metrics::record_write(DRIVER, false);
                false
            }
        }
    }

    fn cache_files(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == EXTENSION))
    }

    fn wipe_root(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&self.root)
    }

    /// Delete every record written under this driver's prefix.
    fn wipe_prefix(&self) -> io::Result<usize> {
        let mut removed = 0;
        for path in self.cache_files() {
            let owned = read_locked(&path)
                .ok()
                .and_then(|bytes| decode_record(&bytes).ok())
                .is_some_and(|record| record.prefix == self.prefix);

            if owned {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl CacheDriver for FileCache {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        match self.load(key) {
            Some(entry) => {
                metrics::record_hit(DRIVER);
                Some(entry.value)
            }
            None => {
                metrics::record_miss(DRIVER);
                None
            }
        }
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<u64>) -> bool {
        let entry = CacheEntry::with_ttl(value, resolve_ttl(ttl, self.default_ttl));
        self.store(key, entry)
    }

    fn delete(&self, key: &str) -> bool {
        self.forget_in_memory(key);
        let path = self.path_for(key);

        match fs::remove_file(&path) {
            Ok(()) => {
                metrics::record_delete(DRIVER);
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to delete cache file {}: {}", path.display(), e);
                false
            }
        }
    }

    fn clear(&self) -> bool {
        {
            let mut memory = self.memory.lock();
            memory.clear();
            metrics::update_memory_entries(DRIVER, 0);
        }
        self.paths.lock().clear();

        let result = if self.prefix.is_empty() {
            self.wipe_root().map(|()| {
                debug!("File cache root wiped: {}", self.root.display());
            })
        } else {
            self.wipe_prefix().map(|removed| {
                debug!("Removed {} files under prefix {:?}", removed, self.prefix);
            })
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to clear file cache {}: {}", self.root.display(), e);
                false
            }
        }
    }

    fn increment(&self, key: &str, by: i64) -> i64 {
        let next = match self.load(key) {
            Some(current) => current.adjusted(by),
            None => CacheEntry::with_ttl(CacheValue::Int(by), self.default_ttl),
        };
        let result = next.value.as_counter();
        self.store(key, next);
        result
    }

    /// Walk every shard and delete records whose expiry has passed. Meant
    /// for periodic invocation; nothing calls it automatically.
    fn clean_expired(&self) -> usize {
        let now = entry::now();

        {
            let mut memory = self.memory.lock();
            let stale: Vec<String> = memory
                .iter()
                .filter(|(_, entry)| !entry.is_live(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in stale {
                memory.pop(&key);
            }
            metrics::update_memory_entries(DRIVER, memory.len());
        }

        let mut removed = 0;
        for path in self.cache_files() {
            let expired = read_locked(&path)
                .ok()
                .and_then(|bytes| decode_record(&bytes).ok())
                .is_some_and(|record| record.expires.is_some_and(|at| at < now));

            if expired && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        debug!("Cleaned up {} expired cache files", removed);
        metrics::record_expired(DRIVER, removed);
        removed
    }
}

/// Read a whole file under a shared lock so a concurrent writer cannot hand
/// us a half-written record.
fn read_locked(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.lock_shared()?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Replace a file's contents while holding an exclusive lock.
fn write_locked(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.lock()?;
    file.set_len(0)?;
    file.write_all(bytes)?;
    file.flush()
}
