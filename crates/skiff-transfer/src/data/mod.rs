//! Immutable data types for the transfer engine.
//!
//! Configuration, the transfer flag set, and the driver event types
//! live here. These types carry no I/O; they are passed by value or
//! reference between the effectful layers.

pub mod config;
pub mod event;
pub mod state;

pub use config::{FileFormat, TransferConfig};
pub use event::{DisconnectReason, Method, TransferEvent};
pub use state::TransferFlags;
