//! Single-shot HTTP transfer engine with incremental file persistence.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration, flags, and event types
//! - [`core`] - Pure transformations (URL splitting, multipart bodies)
//! - [`effects`] - I/O operations with trait abstraction
//!
//! # Key Features
//!
//! - **One transfer at a time**: exactly one outstanding request, one
//!   inbound session; idempotency guards refuse duplicates
//! - **Streaming bodies**: outbound multipart content is pulled from an
//!   [`Entity`] one chunk at a time, never fully buffered
//! - **Incremental persistence**: inbound chunks are appended to storage
//!   as they arrive, with completion detected against the response's
//!   content length or the final-chunk signal
//! - **Transient-disconnect recovery**: a would-block disconnect
//!   re-issues the identical request once per event
//!
//! The network driver and the storage backend are external
//! collaborators behind the [`HttpDriver`] and [`skiff_fs::Storage`]
//! traits; this is not a general HTTP client.

mod core;
mod data;
mod effects;
mod error;

pub use crate::core::{closing_boundary, field_part, file_part_header, urlencoded_body, with_query};
pub use crate::core::{BOUNDARY, FORM_DATA_CONTENT_TYPE, URLENCODED_CONTENT_TYPE, file_name_from_url};
pub use data::{DisconnectReason, FileFormat, Method, TransferConfig, TransferEvent, TransferFlags};
pub use effects::{Entity, FileSink, HttpDriver, ScriptedDriver, SentRequest, StoreOutcome, TransferEngine};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestDriver;

pub use error::{Error, Result};
