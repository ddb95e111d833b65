//! Production [`HttpDriver`] built on `reqwest`.
//!
//! A current-thread tokio runtime drives one streaming request at a
//! time; the response is translated into the engine's event sequence
//! (socket connected, request issued, response headers, chunks,
//! disconnects). Outbound bodies are pulled from the [`Entity`] one
//! chunk at a time through a stream adapter, never fully buffered.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::data::{DisconnectReason, Method, TransferEvent};
use crate::effects::driver::HttpDriver;
use crate::effects::entity::Entity;
use crate::error::{Error, Result};

/// Reqwest-backed driver. Construct once, hand to the host poll loop.
pub struct ReqwestDriver {
    runtime: Runtime,
    client: reqwest::Client,
    inline_body_limit: usize,
    chunk_capacity: usize,
    queue: VecDeque<TransferEvent>,
    pending: Option<(String, Method, Option<Entity>)>,
    stream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
}

impl ReqwestDriver {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Driver whose per-request timeout maps to a transient
    /// [`DisconnectReason::TimedOut`] disconnect.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Driver(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Driver(e.to_string()))?;
        Ok(Self {
            runtime,
            client,
            inline_body_limit: 1446,
            chunk_capacity: 1446,
            queue: VecDeque::new(),
            pending: None,
            stream: None,
        })
    }

    /// Responses no larger than this are delivered inline with the
    /// response headers instead of as chunks.
    pub fn with_inline_body_limit(mut self, limit: usize) -> Self {
        self.inline_body_limit = limit;
        self
    }

    /// Capacity used when pulling outbound entity chunks.
    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Perform the pending dispatch. Returns the first event of the
    /// response sequence; the rest is queued.
    fn begin(&mut self, url: String, method: Method, entity: Option<Entity>) -> TransferEvent {
        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };

        if let Some(entity) = entity {
            request = request.header(reqwest::header::CONTENT_TYPE, entity.content_type());
            if !entity.is_chunked() {
                request = request.header(reqwest::header::CONTENT_LENGTH, entity.content_length());
            }
            let chunks = EntityChunks {
                entity,
                capacity: self.chunk_capacity,
            };
            request = request.body(reqwest::Body::wrap_stream(futures_util::stream::iter(chunks)));
        }

        let response = match self.runtime.block_on(request.send()) {
            Ok(response) => response,
            Err(e) => {
                return TransferEvent::Disconnected { reason: classify(&e) };
            }
        };

        self.queue.push_back(TransferEvent::RequestIssued);

        let status = response.status().as_u16();
        let content_length = response.content_length();
        debug!(status, ?content_length, "response headers");

        let inline = status == 200
            && content_length.is_some_and(|len| len <= self.inline_body_limit as u64);
        if inline {
            match self.runtime.block_on(response.bytes()) {
                Ok(body) => self.queue.push_back(TransferEvent::ResponseReceived {
                    status,
                    content_length,
                    inline_body: Some(body),
                }),
                Err(e) => self.queue.push_back(TransferEvent::Disconnected {
                    reason: classify(&e),
                }),
            }
        } else {
            self.queue.push_back(TransferEvent::ResponseReceived {
                status,
                content_length,
                inline_body: None,
            });
            if status == 200 {
                self.stream = Some(response.bytes_stream().boxed());
            }
        }

        TransferEvent::SocketConnected
    }
}

impl HttpDriver for ReqwestDriver {
    fn send_request(&mut self, url: &str, method: Method, entity: Option<Entity>) -> Result<()> {
        if self.pending.is_some() || self.stream.is_some() {
            return Err(Error::Driver("request already in flight".to_string()));
        }
        self.pending = Some((url.to_string(), method, entity));
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<TransferEvent>> {
        if let Some(event) = self.queue.pop_front() {
            return Ok(Some(event));
        }

        if let Some((url, method, entity)) = self.pending.take() {
            let first = self.begin(url, method, entity);
            return Ok(Some(first));
        }

        if let Some(stream) = self.stream.as_mut() {
            return Ok(Some(match self.runtime.block_on(stream.next()) {
                Some(Ok(data)) => TransferEvent::Chunk {
                    data,
                    is_final: false,
                },
                Some(Err(e)) => {
                    self.stream = None;
                    TransferEvent::Disconnected {
                        reason: classify(&e),
                    }
                }
                None => {
                    self.stream = None;
                    TransferEvent::Chunk {
                        data: Bytes::new(),
                        is_final: true,
                    }
                }
            }));
        }

        Ok(None)
    }
}

/// Map a reqwest error to the engine's disconnect taxonomy. Only the
/// timeout class is transient.
fn classify(e: &reqwest::Error) -> DisconnectReason {
    if e.is_timeout() {
        DisconnectReason::TimedOut
    } else if e.is_connect() {
        DisconnectReason::Reset
    } else {
        DisconnectReason::Closed
    }
}

/// Pulls entity chunks for `reqwest::Body::wrap_stream`.
struct EntityChunks {
    entity: Entity,
    capacity: usize,
}

impl Iterator for EntityChunks {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.entity.read_chunk(self.capacity) {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.entity.close();
                None
            }
            Err(e) => Some(Err(std::io::Error::other(e.to_string()))),
        }
    }
}
