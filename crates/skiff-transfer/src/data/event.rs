//! Driver event types.
//!
//! One sum type per event, dispatched through a single exhaustive
//! `match` in the engine. Each payload carries exactly the data its
//! handler needs; there is no untyped side channel.

use bytes::Bytes;

/// Request method. The engine issues exactly these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Why the peer connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer simply has not responded in time (would-block class).
    /// The only reason treated as transient.
    TimedOut,
    /// Connection reset by the peer.
    Reset,
    /// Orderly close.
    Closed,
    /// Driver-specific reason code.
    Other(i32),
}

impl DisconnectReason {
    /// Transient disconnects are recovered by one immediate retry;
    /// everything else is left for the host to observe.
    pub fn is_transient(self) -> bool {
        matches!(self, DisconnectReason::TimedOut)
    }
}

/// Events delivered by the [`crate::HttpDriver`] poll loop.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// The socket connected. Informational only.
    SocketConnected,
    /// The request left the wire.
    RequestIssued,
    /// Response headers arrived. `inline_body` carries the payload
    /// when the whole response fit within the driver's inline bound.
    ResponseReceived {
        status: u16,
        content_length: Option<u64>,
        inline_body: Option<Bytes>,
    },
    /// A piece of the response body. `is_final` terminates chunked
    /// transfers that never reported a content length.
    Chunk { data: Bytes, is_final: bool },
    /// The connection went away.
    Disconnected { reason: DisconnectReason },
}
