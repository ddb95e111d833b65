//! I/O operations and effectful computations for the transfer engine.
//!
//! Everything that touches storage or the network driver lives here:
//! the outbound [`Entity`] provider, the inbound [`FileSink`], the
//! [`TransferEngine`] orchestrator, and the [`HttpDriver`] boundary.

mod driver;
mod engine;
mod entity;
mod sink;

#[cfg(feature = "reqwest")]
mod reqwest_driver;

pub use driver::{HttpDriver, ScriptedDriver, SentRequest};
pub use engine::TransferEngine;
pub use entity::Entity;
pub use sink::{FileSink, StoreOutcome};

#[cfg(feature = "reqwest")]
pub use reqwest_driver::ReqwestDriver;
