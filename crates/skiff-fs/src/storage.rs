//! The [`Storage`] trait and its two implementations.
//!
//! [`LocalStorage`] wraps `std::fs` under a root directory.
//! [`MemStorage`] is an in-memory double with injectable write
//! failures, exported for tests the same way production code consumes
//! the real thing.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result, from_io};

/// Removable-media readiness, polled by the host loop during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    /// Media is not physically present.
    NotPresent,
    /// Media is present but not yet usable.
    Initializing,
    /// Media is mounted and writable.
    Ready,
    /// Media is present but unusable.
    Failed,
}

impl Default for MediaStatus {
    fn default() -> Self { MediaStatus::Ready }
}

/// Narrow storage collaborator used by the transfer engine.
///
/// Names are flat, relative to the storage root. `create` has
/// truncate-if-exists semantics; collision avoidance happens before
/// any create, via [`crate::resolve_unique`].
pub trait Storage {
    type Reader: Read;
    type Writer: Write;

    /// Current media readiness. Pollable; never blocks.
    fn media_status(&self) -> MediaStatus;

    fn exists(&self, name: &str) -> bool;

    /// Size in bytes of an existing entry.
    fn len(&self, name: &str) -> Result<u64>;

    /// Open an existing entry for sequential reading.
    fn open(&self, name: &str) -> Result<Self::Reader>;

    /// Create (or truncate) an entry for sequential writing.
    fn create(&self, name: &str) -> Result<Self::Writer>;

    fn remove(&self, name: &str) -> Result<()>;
}

/// `std::fs`-backed storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path { &self.root }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Storage for LocalStorage {
    type Reader = fs::File;
    type Writer = fs::File;

    fn media_status(&self) -> MediaStatus {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => MediaStatus::Ready,
            Ok(_) => MediaStatus::Failed,
            Err(e) if e.kind() == io::ErrorKind::NotFound => MediaStatus::NotPresent,
            Err(_) => MediaStatus::Failed,
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    fn len(&self, name: &str) -> Result<u64> {
        let meta = fs::metadata(self.path_of(name)).map_err(from_io)?;
        Ok(meta.len())
    }

    fn open(&self, name: &str) -> Result<Self::Reader> {
        fs::File::open(self.path_of(name)).map_err(from_io)
    }

    fn create(&self, name: &str) -> Result<Self::Writer> {
        fs::File::create(self.path_of(name)).map_err(from_io)
    }

    fn remove(&self, name: &str) -> Result<()> {
        fs::remove_file(self.path_of(name)).map_err(from_io)
    }
}

#[derive(Debug, Default)]
struct MemInner {
    files: BTreeMap<String, Vec<u8>>,
    status: MediaStatus,
    /// Remaining successful writes before injected failure; `None`
    /// disables injection.
    write_budget: Option<usize>,
    /// Remaining successful reads before injected failure; `None`
    /// disables injection.
    read_budget: Option<usize>,
}

/// In-memory storage for tests.
///
/// Clones share the same underlying map, so a clone handed to the
/// engine stays observable from the test body.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    inner: Arc<Mutex<MemInner>>,
}

impl MemStorage {
    pub fn new() -> Self { Self::default() }

    /// Pre-populate an entry.
    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.lock().files.insert(name.to_string(), data.into());
    }

    /// Contents of an entry, if present.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().files.get(name).cloned()
    }

    /// Names of all entries, sorted.
    pub fn names(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn set_status(&self, status: MediaStatus) {
        self.lock().status = status;
    }

    /// Allow `n` more successful writes, then fail every write.
    pub fn fail_writes_after(&self, n: usize) {
        self.lock().write_budget = Some(n);
    }

    /// Allow `n` more successful reads, then fail every read.
    pub fn fail_reads_after(&self, n: usize) {
        self.lock().read_budget = Some(n);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemStorage {
    type Reader = MemReader;
    type Writer = MemWriter;

    fn media_status(&self) -> MediaStatus {
        self.lock().status
    }

    fn exists(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }

    fn len(&self, name: &str) -> Result<u64> {
        self.lock()
            .files
            .get(name)
            .map(|d| d.len() as u64)
            .ok_or(Error::NotFound)
    }

    fn open(&self, name: &str) -> Result<Self::Reader> {
        let data = self.lock().files.get(name).cloned().ok_or(Error::NotFound)?;
        Ok(MemReader {
            inner: io::Cursor::new(data),
            shared: Arc::clone(&self.inner),
        })
    }

    fn create(&self, name: &str) -> Result<Self::Writer> {
        self.lock().files.insert(name.to_string(), Vec::new());
        Ok(MemWriter {
            inner: Arc::clone(&self.inner),
            name: name.to_string(),
        })
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.lock()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or(Error::NotFound)
    }
}

/// Reader handle over a snapshot of a [`MemStorage`] entry.
#[derive(Debug)]
pub struct MemReader {
    inner: io::Cursor<Vec<u8>>,
    shared: Arc<Mutex<MemInner>>,
}

impl Read for MemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(budget) = shared.read_budget.as_mut() {
                if *budget == 0 {
                    return Err(io::Error::other("injected read failure"));
                }
                *budget -= 1;
            }
        }
        self.inner.read(buf)
    }
}

/// Writer handle appending into a [`MemStorage`] entry.
#[derive(Debug)]
pub struct MemWriter {
    inner: Arc<Mutex<MemInner>>,
    name: String,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(budget) = inner.write_budget.as_mut() {
            if *budget == 0 {
                return Err(io::Error::other("injected write failure"));
            }
            *budget -= 1;
        }
        match inner.files.get_mut(&self.name) {
            Some(data) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, "entry removed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}
