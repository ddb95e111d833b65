//! The network driver boundary.
//!
//! The engine never touches sockets; it hands requests to an
//! [`HttpDriver`] and consumes [`TransferEvent`]s from its poll loop.
//! [`ScriptedDriver`] replays a scripted event sequence and captures
//! dispatched requests, for tests.

use std::collections::VecDeque;

use crate::data::{Method, TransferEvent};
use crate::effects::entity::Entity;
use crate::error::Result;

/// Request dispatch plus single-threaded event polling.
///
/// Implementations own connection establishment, header emission, and
/// chunk delivery. Events are delivered one at a time from
/// `poll_event`; there is no concurrent callback path.
pub trait HttpDriver {
    /// Dispatch one request, with an optional streaming body.
    fn send_request(&mut self, url: &str, method: Method, entity: Option<Entity>) -> Result<()>;

    /// Next pending event, if any. Never blocks indefinitely.
    fn poll_event(&mut self) -> Result<Option<TransferEvent>>;
}

/// One request captured by [`ScriptedDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub url: String,
    pub method: Method,
    /// Fully drained body bytes, when an entity was attached.
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

/// Scripted driver for tests: pops pre-loaded events and records every
/// dispatched request, draining attached entities chunk by chunk.
pub struct ScriptedDriver {
    events: VecDeque<TransferEvent>,
    /// Capacity used when draining entity bodies.
    chunk_capacity: usize,
    pub sent: Vec<SentRequest>,
}

impl Default for ScriptedDriver {
    fn default() -> Self { Self::new() }
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            chunk_capacity: 1024,
            sent: Vec::new(),
        }
    }

    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Queue an event for a later `poll_event`.
    pub fn push_event(&mut self, event: TransferEvent) {
        self.events.push_back(event);
    }
}

impl HttpDriver for ScriptedDriver {
    fn send_request(&mut self, url: &str, method: Method, entity: Option<Entity>) -> Result<()> {
        let (body, content_type) = match entity {
            None => (None, None),
            Some(mut entity) => {
                let content_type = entity.content_type().to_string();
                let mut body = Vec::new();
                while let Some(chunk) = entity.read_chunk(self.chunk_capacity)? {
                    body.extend_from_slice(&chunk);
                }
                entity.close();
                (Some(body), Some(content_type))
            }
        };
        self.sent.push(SentRequest {
            url: url.to_string(),
            method,
            body,
            content_type,
        });
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<TransferEvent>> {
        Ok(self.events.pop_front())
    }
}
