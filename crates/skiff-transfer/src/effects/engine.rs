//! Transfer orchestrator and response state machine.
//!
//! The engine owns the flag set, the persistence sink, and the pending
//! request description. Requests are issued only when every dispatch
//! guard passes; inbound events are handled through one exhaustive
//! match. A transient disconnect re-issues the identical pending
//! request, rebuilt from its [`BodySpec`], once per disconnect event.

use bytes::Bytes;
use skiff_fs::Storage;
use tracing::{info, warn};

use crate::core::multipart::{field_part, file_part_header, urlencoded_body};
use crate::core::url::with_query;
use crate::data::{DisconnectReason, FileFormat, Method, TransferConfig, TransferEvent, TransferFlags};
use crate::effects::driver::HttpDriver;
use crate::effects::entity::Entity;
use crate::effects::sink::FileSink;
use crate::error::Result;

/// Cloneable description of a request body, from which an [`Entity`]
/// is constructed at every dispatch so a retry re-issues an identical
/// request.
#[derive(Debug, Clone)]
enum BodySpec {
    Literal(Bytes),
    FileBacked { file_name: String, prefix: Bytes },
}

#[derive(Debug, Clone)]
struct PendingRequest {
    url: String,
    method: Method,
    body: Option<BodySpec>,
    /// Whether re-dispatch must re-check the storage guard.
    needs_storage: bool,
}

/// Orchestrator for exactly one transfer at a time.
pub struct TransferEngine<S: Storage> {
    config: TransferConfig,
    storage: S,
    flags: TransferFlags,
    sink: FileSink<S>,
    pending: Option<PendingRequest>,
    retries: u32,
}

impl<S> TransferEngine<S>
where
    S: Storage,
    S::Reader: Send + 'static,
{
    pub fn new(config: TransferConfig, storage: S) -> Self {
        Self {
            config,
            storage,
            flags: TransferFlags::empty(),
            sink: FileSink::new(),
            pending: None,
            retries: 0,
        }
    }

    pub fn flags(&self) -> TransferFlags {
        self.flags
    }

    pub fn is_terminal(&self) -> bool {
        self.flags.is_terminal()
    }

    pub fn completed(&self) -> bool {
        self.flags.is_set(TransferFlags::COMPLETED)
    }

    /// Transient-disconnect retries performed so far. Unbounded by
    /// design; exposed so hosts can impose their own cap.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn received(&self) -> u64 {
        self.sink.received()
    }

    /// Resolved output file name, once the session file exists.
    pub fn file_name(&self) -> Option<&str> {
        self.sink.file_name()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Bring-up notification: storage media mounted and writable.
    pub fn mark_storage_ready(&mut self) {
        self.flags.set(TransferFlags::STORAGE_READY);
    }

    /// Bring-up notification: network association established.
    pub fn mark_network_ready(&mut self) {
        self.flags.set(TransferFlags::NETWORK_READY);
    }

    /// The network association dropped: close any open session and
    /// forget the in-flight request. The host decides whether to
    /// re-associate and dispatch again.
    pub fn mark_network_lost(&mut self) {
        self.flags.clear(TransferFlags::NETWORK_READY);
        if self.flags.is_set(TransferFlags::RECEIVING) {
            self.sink.abort();
            self.flags.clear(TransferFlags::RECEIVING);
        }
        self.flags.clear(TransferFlags::REQUEST_SENT);
    }

    /// Issue the download request (GET, no body).
    pub fn start_download<D: HttpDriver>(&mut self, driver: &mut D) -> Result<()> {
        if !self.guards_pass("start_download", true) {
            return Ok(());
        }
        self.pending = Some(PendingRequest {
            url: self.config.download_url.clone(),
            method: Method::Get,
            body: None,
            needs_storage: true,
        });
        self.dispatch(driver)
    }

    /// Issue the upload request (POST, multipart).
    ///
    /// [`FileFormat::None`] sends a bare `key=value` form field;
    /// other formats stream the named storage entry as a file part.
    pub fn start_upload<D: HttpDriver>(
        &mut self,
        driver: &mut D,
        file_name: &str,
        format: FileFormat,
        key: &str,
        value: &str,
    ) -> Result<()> {
        if !self.guards_pass("start_upload", true) {
            return Ok(());
        }
        let body = match format {
            FileFormat::None => BodySpec::Literal(Bytes::from(field_part(key, value))),
            FileFormat::Binary | FileFormat::Text => BodySpec::FileBacked {
                file_name: file_name.to_string(),
                prefix: Bytes::from(file_part_header(key, file_name, format)),
            },
        };
        self.pending = Some(PendingRequest {
            url: self.config.upload_url.clone(),
            method: Method::Post,
            body: Some(body),
            needs_storage: true,
        });
        self.dispatch(driver)
    }

    /// Issue a form post (POST, URL-encoded pairs in both the query
    /// string and the body). An empty pair list posts without a body.
    pub fn start_post<D: HttpDriver>(
        &mut self,
        driver: &mut D,
        pairs: &[(String, String)],
    ) -> Result<()> {
        // Posting literal pairs touches no storage, so the storage
        // guard is skipped here.
        if !self.guards_pass("start_post", false) {
            return Ok(());
        }
        let body = (!pairs.is_empty())
            .then(|| BodySpec::Literal(Bytes::from(urlencoded_body(pairs))));
        self.pending = Some(PendingRequest {
            url: with_query(&self.config.upload_url, pairs),
            method: Method::Post,
            body,
            needs_storage: false,
        });
        self.dispatch(driver)
    }

    /// Handle one driver event.
    pub fn handle_event<D: HttpDriver>(
        &mut self,
        driver: &mut D,
        event: TransferEvent,
    ) -> Result<()> {
        match event {
            TransferEvent::SocketConnected => {
                info!("socket connected");
                Ok(())
            }
            TransferEvent::RequestIssued => {
                info!("request issued");
                self.flags.set(TransferFlags::REQUEST_SENT);
                Ok(())
            }
            TransferEvent::ResponseReceived {
                status,
                content_length,
                inline_body,
            } => {
                info!(status, ?content_length, "response received");
                // The request is answered; REQUEST_SENT and RECEIVING
                // only ever coexist between dispatch and this point.
                self.flags.clear(TransferFlags::REQUEST_SENT);

                if status != 200 {
                    self.cancel("non-success response status");
                    return Ok(());
                }

                self.sink.set_expected(content_length);

                if let Some(body) = inline_body {
                    if body.len() > self.config.inline_body_limit {
                        warn!(
                            len = body.len(),
                            limit = self.config.inline_body_limit,
                            "inline body exceeds configured bound"
                        );
                    }
                    self.sink
                        .store(&self.storage, &mut self.flags, &self.config, &body)?;
                    self.complete();
                }
                Ok(())
            }
            TransferEvent::Chunk { data, is_final } => {
                let result =
                    self.sink
                        .store(&self.storage, &mut self.flags, &self.config, &data);
                if is_final {
                    // Chunked transfers may never have reported a
                    // content length; the final-chunk signal completes
                    // regardless of size bookkeeping.
                    self.complete();
                }
                result.map(|_| ())
            }
            TransferEvent::Disconnected { reason } => {
                info!(?reason, "disconnected");
                if reason.is_transient() && !self.flags.is_terminal() {
                    // Peer simply has not responded yet: drop the
                    // session and re-issue the identical request.
                    if self.flags.is_set(TransferFlags::RECEIVING) {
                        self.sink.abort();
                        self.flags.clear(TransferFlags::RECEIVING);
                    }
                    self.flags.clear(TransferFlags::REQUEST_SENT);
                    let needs_storage =
                        self.pending.as_ref().is_some_and(|p| p.needs_storage);
                    if self.guards_pass("retry", needs_storage) {
                        self.retries += 1;
                        info!(retries = self.retries, "transient disconnect, retrying");
                        self.dispatch(driver)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Dispatch guards, checked in priority order. Each refusal is a
    /// logged local no-op, not an error.
    fn guards_pass(&self, op: &str, needs_storage: bool) -> bool {
        if self.flags.is_terminal() {
            warn!(op, "refused: transfer already terminal");
            return false;
        }
        if needs_storage && !self.flags.is_set(TransferFlags::STORAGE_READY) {
            warn!(op, "refused: storage not ready");
            return false;
        }
        if !self.flags.is_set(TransferFlags::NETWORK_READY) {
            warn!(op, "refused: network not ready");
            return false;
        }
        if self.flags.is_set(TransferFlags::REQUEST_SENT) {
            warn!(op, "refused: request already in flight");
            return false;
        }
        if self.flags.is_set(TransferFlags::RECEIVING) {
            warn!(op, "refused: transfer already receiving");
            return false;
        }
        true
    }

    /// Build the entity for the pending request and hand it to the
    /// driver. An upload source that fails to open cancels the
    /// transfer.
    fn dispatch<D: HttpDriver>(&mut self, driver: &mut D) -> Result<()> {
        let Some(pending) = self.pending.clone() else {
            return Ok(());
        };
        let entity = match &pending.body {
            None => None,
            Some(BodySpec::Literal(data)) => Some(Entity::literal(data.clone())),
            Some(BodySpec::FileBacked { file_name, prefix }) => {
                match Entity::file_backed(&self.storage, file_name, prefix.clone()) {
                    Ok(entity) => Some(entity),
                    Err(e) => {
                        self.cancel("upload source open failed");
                        return Err(e);
                    }
                }
            }
        };
        info!(url = %pending.url, method = pending.method.as_str(), "sending HTTP request");
        if let Err(e) = driver.send_request(&pending.url, pending.method, entity) {
            self.cancel("request dispatch failed");
            return Err(e);
        }
        Ok(())
    }

    /// Host-initiated cancellation: close the session file and mark
    /// the transfer canceled. No-op once completed.
    pub fn abort(&mut self, reason: &str) {
        self.cancel(reason);
    }

    fn complete(&mut self) {
        if self.flags.is_set(TransferFlags::CANCELED) {
            return;
        }
        self.sink.close();
        self.flags.set(TransferFlags::COMPLETED);
    }

    fn cancel(&mut self, reason: &str) {
        if self.flags.is_set(TransferFlags::COMPLETED) {
            return;
        }
        warn!(reason, "transfer canceled");
        self.sink.close();
        self.flags.set(TransferFlags::CANCELED);
    }
}

#[cfg(test)]
mod tests {
    use skiff_fs::MemStorage;

    use super::*;
    use crate::core::multipart::BOUNDARY;
    use crate::effects::driver::ScriptedDriver;

    const URL: &str = "http://files.example.com/pub/report.bin";

    fn ready_engine(storage: MemStorage) -> TransferEngine<MemStorage> {
        let config = TransferConfig::new(URL).with_upload_url("http://files.example.com/submit");
        let mut engine = TransferEngine::new(config, storage);
        engine.mark_storage_ready();
        engine.mark_network_ready();
        engine
    }

    fn response_ok(content_length: Option<u64>) -> TransferEvent {
        TransferEvent::ResponseReceived {
            status: 200,
            content_length,
            inline_body: None,
        }
    }

    #[test]
    fn chunked_download_completes_at_expected_size() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage.clone());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        assert_eq!(driver.sent.len(), 1);
        assert_eq!(driver.sent[0].url, URL);
        assert_eq!(driver.sent[0].method, Method::Get);

        let total: u64 = 1_147_097;
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(&mut driver, response_ok(Some(total)))
            .unwrap();

        let mut sent = 0u64;
        while sent < total {
            let len = 1446.min(total - sent);
            sent += len;
            let data = Bytes::from(vec![0x5a; len as usize]);
            engine
                .handle_event(
                    &mut driver,
                    TransferEvent::Chunk {
                        data,
                        is_final: false,
                    },
                )
                .unwrap();
        }

        assert!(engine.completed());
        assert_eq!(engine.received(), total);
        assert_eq!(engine.file_name(), Some("report.bin"));
        assert_eq!(storage.get("report.bin").unwrap().len() as u64, total);
        assert_eq!(storage.names().len(), 1);
    }

    #[test]
    fn inline_body_completes_in_one_event() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage.clone());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::ResponseReceived {
                    status: 200,
                    content_length: Some(5),
                    inline_body: Some(Bytes::from_static(b"hello")),
                },
            )
            .unwrap();

        assert!(engine.completed());
        assert_eq!(storage.get("report.bin").unwrap(), b"hello");
    }

    #[test]
    fn second_download_of_same_resource_gets_suffixed_name() {
        let storage = MemStorage::new();
        storage.insert("report.bin", b"first".to_vec());
        let mut engine = ready_engine(storage.clone());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(&mut driver, response_ok(Some(6)))
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::Chunk {
                    data: Bytes::from_static(b"second"),
                    is_final: false,
                },
            )
            .unwrap();

        assert!(engine.completed());
        assert_eq!(engine.file_name(), Some("report-001.bin"));
        assert_eq!(storage.get("report.bin").unwrap(), b"first");
        assert_eq!(storage.get("report-001.bin").unwrap(), b"second");
    }

    #[test]
    fn non_success_status_cancels_without_writing() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage.clone());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::ResponseReceived {
                    status: 404,
                    content_length: Some(1234),
                    inline_body: None,
                },
            )
            .unwrap();

        assert!(engine.flags().is_set(TransferFlags::CANCELED));
        assert!(!engine.completed());
        assert_eq!(engine.received(), 0);
        assert!(storage.names().is_empty());
    }

    #[test]
    fn transient_disconnect_retransmits_identical_request_once() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage);
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::Disconnected {
                    reason: DisconnectReason::TimedOut,
                },
            )
            .unwrap();

        assert_eq!(engine.retries(), 1);
        assert_eq!(driver.sent.len(), 2);
        assert_eq!(driver.sent[0].url, driver.sent[1].url);
        assert_eq!(driver.sent[0].method, driver.sent[1].method);
        assert_eq!(driver.sent[0].body, driver.sent[1].body);
        assert!(!engine.is_terminal());
    }

    #[test]
    fn fatal_disconnect_does_not_retry() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage);
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::Disconnected {
                    reason: DisconnectReason::Reset,
                },
            )
            .unwrap();

        assert_eq!(engine.retries(), 0);
        assert_eq!(driver.sent.len(), 1);
    }

    #[test]
    fn disconnect_mid_receive_discards_partial_session_and_retries() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage.clone());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(&mut driver, response_ok(Some(100)))
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::Chunk {
                    data: Bytes::from_static(b"partial"),
                    is_final: false,
                },
            )
            .unwrap();
        assert!(engine.flags().is_set(TransferFlags::RECEIVING));

        engine
            .handle_event(
                &mut driver,
                TransferEvent::Disconnected {
                    reason: DisconnectReason::TimedOut,
                },
            )
            .unwrap();

        assert!(!engine.flags().is_set(TransferFlags::RECEIVING));
        assert_eq!(engine.retries(), 1);
        assert_eq!(driver.sent.len(), 2);
    }

    #[test]
    fn dispatch_refused_until_network_ready() {
        let mut engine = TransferEngine::new(TransferConfig::new(URL), MemStorage::new());
        engine.mark_storage_ready();
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        assert!(driver.sent.is_empty());

        engine.mark_network_ready();
        engine.start_download(&mut driver).unwrap();
        assert_eq!(driver.sent.len(), 1);
    }

    #[test]
    fn dispatch_refused_while_request_in_flight() {
        let mut engine = ready_engine(MemStorage::new());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine.start_download(&mut driver).unwrap();

        assert_eq!(driver.sent.len(), 1);
    }

    #[test]
    fn dispatch_refused_after_terminal_state() {
        let mut engine = ready_engine(MemStorage::new());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::ResponseReceived {
                    status: 500,
                    content_length: None,
                    inline_body: None,
                },
            )
            .unwrap();
        assert!(engine.is_terminal());

        engine.start_download(&mut driver).unwrap();
        assert_eq!(driver.sent.len(), 1);
    }

    #[test]
    fn upload_streams_multipart_body_and_retry_resends_identical_bytes() {
        let storage = MemStorage::new();
        storage.insert("data.bin", vec![1u8, 2, 3, 4]);
        let mut engine = ready_engine(storage);
        let mut driver = ScriptedDriver::new();

        engine
            .start_upload(&mut driver, "data.bin", FileFormat::Binary, "file", "")
            .unwrap();
        assert_eq!(driver.sent.len(), 1);
        assert_eq!(driver.sent[0].method, Method::Post);
        let content_type = driver.sent[0].content_type.as_deref().unwrap();
        assert!(content_type.contains(BOUNDARY));
        let body = driver.sent[0].body.as_deref().unwrap();
        assert!(body.windows(4).any(|w| w == [1, 2, 3, 4]));
        assert!(body.ends_with(format!("\r\n--{BOUNDARY}--\r\n").as_bytes()));

        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::Disconnected {
                    reason: DisconnectReason::TimedOut,
                },
            )
            .unwrap();

        assert_eq!(driver.sent.len(), 2);
        assert_eq!(driver.sent[0].body, driver.sent[1].body);
    }

    #[test]
    fn upload_of_missing_file_cancels() {
        let mut engine = ready_engine(MemStorage::new());
        let mut driver = ScriptedDriver::new();

        let err = engine.start_upload(&mut driver, "absent.bin", FileFormat::Binary, "file", "");
        assert!(err.is_err());
        assert!(engine.flags().is_set(TransferFlags::CANCELED));
        assert!(driver.sent.is_empty());
    }

    #[test]
    fn form_post_carries_pairs_in_query_and_body() {
        let mut engine = ready_engine(MemStorage::new());
        let mut driver = ScriptedDriver::new();

        let pairs = vec![
            ("device".to_string(), "skiff".to_string()),
            ("fw".to_string(), "1.2".to_string()),
        ];
        engine.start_post(&mut driver, &pairs).unwrap();

        assert_eq!(driver.sent.len(), 1);
        assert_eq!(
            driver.sent[0].url,
            "http://files.example.com/submit?device=skiff&fw=1.2"
        );
        assert_eq!(
            driver.sent[0].body.as_deref().unwrap(),
            b"device=skiff&fw=1.2"
        );
    }

    #[test]
    fn retry_refused_after_network_loss() {
        let mut engine = ready_engine(MemStorage::new());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine.mark_network_lost();

        engine
            .handle_event(
                &mut driver,
                TransferEvent::Disconnected {
                    reason: DisconnectReason::TimedOut,
                },
            )
            .unwrap();

        assert_eq!(engine.retries(), 0);
        assert_eq!(driver.sent.len(), 1);
        assert!(!engine.is_terminal());
    }

    #[test]
    fn oversized_inline_body_is_still_stored() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage.clone());
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        let body = Bytes::from(vec![0x21; 2000]);
        engine
            .handle_event(
                &mut driver,
                TransferEvent::ResponseReceived {
                    status: 200,
                    content_length: Some(2000),
                    inline_body: Some(body),
                },
            )
            .unwrap();

        assert!(engine.completed());
        assert_eq!(storage.get("report.bin").unwrap().len(), 2000);
    }

    #[test]
    fn upload_read_failure_surfaces_and_cancels() {
        let storage = MemStorage::new();
        storage.insert("data.bin", vec![7u8; 64]);
        storage.fail_reads_after(0);
        let mut engine = ready_engine(storage);
        let mut driver = ScriptedDriver::new();

        let err = engine.start_upload(&mut driver, "data.bin", FileFormat::Binary, "file", "");
        assert!(matches!(err, Err(crate::error::Error::Read(_))));
        assert!(engine.flags().is_set(TransferFlags::CANCELED));
        assert!(driver.sent.is_empty());
    }

    #[test]
    fn network_loss_clears_session_state() {
        let storage = MemStorage::new();
        let mut engine = ready_engine(storage);
        let mut driver = ScriptedDriver::new();

        engine.start_download(&mut driver).unwrap();
        engine
            .handle_event(&mut driver, TransferEvent::RequestIssued)
            .unwrap();
        engine
            .handle_event(&mut driver, response_ok(Some(100)))
            .unwrap();
        engine
            .handle_event(
                &mut driver,
                TransferEvent::Chunk {
                    data: Bytes::from_static(b"some"),
                    is_final: false,
                },
            )
            .unwrap();

        engine.mark_network_lost();
        assert!(!engine.flags().is_set(TransferFlags::NETWORK_READY));
        assert!(!engine.flags().is_set(TransferFlags::RECEIVING));
        assert!(!engine.is_terminal());
    }
}
