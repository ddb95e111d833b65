//! Incremental file persistence for inbound payload bytes.
//!
//! The sink lazily creates the session file on the first stored chunk,
//! appends every span as it arrives, and detects completion against
//! the expected size recorded from the response headers. The file
//! handle is closed exactly once, on completion or on failure.

use std::io::Write;

use skiff_fs::{Storage, resolve_unique};
use tracing::{debug, info, warn};

use crate::core::url::file_name_from_url;
use crate::data::{TransferConfig, TransferFlags};
use crate::error::{Error, Result};

/// What a successful `store` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Bytes appended; transfer still in progress.
    Stored,
    /// Bytes appended and the expected size was reached; the file is
    /// closed and `COMPLETED` is set.
    Completed,
    /// Empty input or terminal state; nothing changed.
    Ignored,
}

/// The inbound session: resolved file name, size bookkeeping, and the
/// exclusively owned writer.
pub struct FileSink<S: Storage> {
    file_name: Option<String>,
    writer: Option<S::Writer>,
    expected: Option<u64>,
    received: u64,
}

impl<S: Storage> Default for FileSink<S> {
    fn default() -> Self { Self::new() }
}

impl<S: Storage> FileSink<S> {
    pub fn new() -> Self {
        Self {
            file_name: None,
            writer: None,
            expected: None,
            received: 0,
        }
    }

    /// Record the expected total from the response header and reset
    /// the received counter. `None` (chunked, no Content-Length)
    /// disables size-based completion; the final-chunk signal
    /// completes instead.
    pub fn set_expected(&mut self, expected: Option<u64>) {
        self.expected = expected;
        self.received = 0;
    }

    /// Bytes received so far in this session.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Resolved file name, once the session file exists.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Store one inbound span.
    ///
    /// Empty data is a no-op. The first non-empty span while not
    /// `RECEIVING` resolves the output name from the download URL and
    /// creates the file; any failure on that path or on append sets
    /// `CANCELED` and closes the handle. Reaching the expected size
    /// closes the handle and sets `COMPLETED`.
    pub fn store(
        &mut self,
        storage: &S,
        flags: &mut TransferFlags,
        config: &TransferConfig,
        data: &[u8],
    ) -> Result<StoreOutcome> {
        if data.is_empty() {
            debug!("store: empty data");
            return Ok(StoreOutcome::Ignored);
        }
        if flags.is_terminal() {
            return Ok(StoreOutcome::Ignored);
        }

        if !flags.is_set(TransferFlags::RECEIVING) {
            let candidate = match file_name_from_url(&config.download_url) {
                Some(name) => name,
                None => {
                    warn!(url = %config.download_url, "store: file name is invalid, download canceled");
                    flags.set(TransferFlags::CANCELED);
                    return Err(Error::NoFileName);
                }
            };

            let resolved = match resolve_unique(
                storage,
                candidate,
                config.max_file_name_len,
                config.max_file_ext_len,
            ) {
                Ok(name) => name,
                Err(e) => {
                    warn!(candidate, error = %e, "store: name resolution failed, download canceled");
                    flags.set(TransferFlags::CANCELED);
                    return Err(e.into());
                }
            };

            info!(file = %resolved, "store: creating file");
            let writer = match storage.create(&resolved) {
                Ok(w) => w,
                Err(e) => {
                    warn!(file = %resolved, error = %e, "store: file creation failed, download canceled");
                    flags.set(TransferFlags::CANCELED);
                    return Err(e.into());
                }
            };

            self.file_name = Some(resolved);
            self.writer = Some(writer);
            self.received = 0;
            flags.set(TransferFlags::RECEIVING);
        }

        let writer = self.writer.as_mut().ok_or(Error::Terminal)?;
        if let Err(e) = writer.write_all(data) {
            self.writer = None;
            flags.set(TransferFlags::CANCELED);
            warn!(error = %e, "store: file write error, download canceled");
            return Err(Error::Write(e));
        }

        self.received += data.len() as u64;
        debug!(
            received = self.received,
            expected = ?self.expected,
            "store: appended chunk"
        );

        if let Some(expected) = self.expected {
            if self.received >= expected {
                self.close();
                flags.set(TransferFlags::COMPLETED);
                info!(file = ?self.file_name, "store: file downloaded successfully");
                return Ok(StoreOutcome::Completed);
            }
        }

        Ok(StoreOutcome::Stored)
    }

    /// Close the session writer, flushing buffered bytes. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }

    /// Abandon the current session, keeping name bookkeeping for
    /// diagnostics. Used on transient disconnects before a retry.
    pub fn abort(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_fs::MemStorage;

    fn config() -> TransferConfig {
        TransferConfig::new("http://host/files/data.bin")
    }

    fn store_ready_flags() -> TransferFlags {
        let mut flags = TransferFlags::empty();
        flags.set(TransferFlags::STORAGE_READY);
        flags.set(TransferFlags::NETWORK_READY);
        flags
    }

    #[test]
    fn empty_data_is_a_noop() {
        let storage = MemStorage::new();
        let mut sink = FileSink::new();
        let mut flags = store_ready_flags();

        let outcome = sink.store(&storage, &mut flags, &config(), &[]).unwrap();
        assert_eq!(outcome, StoreOutcome::Ignored);
        assert_eq!(sink.received(), 0);
        assert!(!flags.is_set(TransferFlags::RECEIVING));
        assert!(storage.names().is_empty());
    }

    #[test]
    fn first_chunk_creates_file_and_sets_receiving() {
        let storage = MemStorage::new();
        let mut sink = FileSink::new();
        let mut flags = store_ready_flags();
        sink.set_expected(Some(10));

        let outcome = sink
            .store(&storage, &mut flags, &config(), b"01234")
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Stored);
        assert!(flags.is_set(TransferFlags::RECEIVING));
        assert_eq!(sink.file_name(), Some("data.bin"));
        assert_eq!(sink.received(), 5);
    }

    #[test]
    fn completion_when_received_reaches_expected() {
        let storage = MemStorage::new();
        let mut sink = FileSink::new();
        let mut flags = store_ready_flags();
        sink.set_expected(Some(10));

        sink.store(&storage, &mut flags, &config(), b"01234").unwrap();
        let outcome = sink
            .store(&storage, &mut flags, &config(), b"56789")
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Completed);
        assert!(flags.is_set(TransferFlags::COMPLETED));
        assert_eq!(storage.get("data.bin").unwrap(), b"0123456789");
    }

    #[test]
    fn unknown_expected_size_never_autocompletes() {
        let storage = MemStorage::new();
        let mut sink = FileSink::new();
        let mut flags = store_ready_flags();
        sink.set_expected(None);

        for _ in 0..4 {
            let outcome = sink
                .store(&storage, &mut flags, &config(), b"chunk")
                .unwrap();
            assert_eq!(outcome, StoreOutcome::Stored);
        }
        assert!(!flags.is_terminal());
        assert_eq!(sink.received(), 20);
    }

    #[test]
    fn write_failure_cancels_and_rejects_further_stores() {
        let storage = MemStorage::new();
        let mut sink = FileSink::new();
        let mut flags = store_ready_flags();
        sink.set_expected(Some(100));
        storage.fail_writes_after(1);

        sink.store(&storage, &mut flags, &config(), b"ok").unwrap();
        let err = sink.store(&storage, &mut flags, &config(), b"boom");
        assert!(matches!(err, Err(Error::Write(_))));
        assert!(flags.is_set(TransferFlags::CANCELED));

        // Session cannot be reused post-cancel.
        let outcome = sink
            .store(&storage, &mut flags, &config(), b"more")
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Ignored);
        assert_eq!(storage.get("data.bin").unwrap(), b"ok");
    }

    #[test]
    fn url_without_file_name_cancels() {
        let storage = MemStorage::new();
        let mut sink = FileSink::new();
        let mut flags = store_ready_flags();
        let config = TransferConfig::new("http://host/");

        let err = sink.store(&storage, &mut flags, &config, b"data");
        assert!(matches!(err, Err(Error::NoFileName)));
        assert!(flags.is_set(TransferFlags::CANCELED));
        assert!(storage.names().is_empty());
    }

    #[test]
    fn existing_file_gets_suffixed_name() {
        let storage = MemStorage::new();
        storage.insert("data.bin", b"old".to_vec());
        let mut sink = FileSink::new();
        let mut flags = store_ready_flags();
        sink.set_expected(Some(3));

        sink.store(&storage, &mut flags, &config(), b"new").unwrap();
        assert_eq!(sink.file_name(), Some("data-001.bin"));
        assert_eq!(storage.get("data.bin").unwrap(), b"old");
        assert_eq!(storage.get("data-001.bin").unwrap(), b"new");
    }
}
