//! Transfer progress flag set.
//!
//! A plain value type owned by the engine and threaded through every
//! transition; nothing here is global or shared.

/// Independent progress flags for one transfer.
///
/// `COMPLETED` and `CANCELED` are terminal and mutually exclusive
/// (enforced by the engine, not the flag set); once either is set no
/// further requests are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferFlags(u8);

impl TransferFlags {
    /// Storage media mounted and writable.
    pub const STORAGE_READY: Self = Self(1 << 0);
    /// Network association established.
    pub const NETWORK_READY: Self = Self(1 << 1);
    /// A request is in flight, not yet answered.
    pub const REQUEST_SENT: Self = Self(1 << 2);
    /// An inbound session is open and receiving chunks.
    pub const RECEIVING: Self = Self(1 << 3);
    /// Transfer finished successfully.
    pub const COMPLETED: Self = Self(1 << 4);
    /// Transfer abandoned.
    pub const CANCELED: Self = Self(1 << 5);

    pub const fn empty() -> Self { Self(0) }

    /// Set flags. Redundant sets have no effect.
    pub fn set(&mut self, flags: Self) {
        self.0 |= flags.0;
    }

    /// Clear flags. Redundant clears have no effect.
    pub fn clear(&mut self, flags: Self) {
        self.0 &= !flags.0;
    }

    /// Whether any of `flags` is set.
    pub const fn is_set(self, flags: Self) -> bool {
        self.0 & flags.0 != 0
    }

    /// Whether the transfer reached a terminal flag.
    pub const fn is_terminal(self) -> bool {
        self.0 & (Self::COMPLETED.0 | Self::CANCELED.0) != 0
    }
}
