//! Storage abstraction and collision-free name resolution.
//!
//! Everything the transfer engine knows about persistent storage goes
//! through the [`Storage`] trait: existence checks, sequential reads,
//! truncating creates, and a polled [`MediaStatus`] so bring-up can be
//! driven from the same cooperative loop as the transfer itself.
//!
//! [`resolve_unique`] implements the numbered-suffix scheme that keeps
//! repeated downloads of the same remote file from overwriting each
//! other.

mod error;
mod naming;
mod storage;

pub use error::{Error, Result, from_io};
pub use naming::resolve_unique;
pub use storage::{LocalStorage, MediaStatus, MemStorage, Storage};
