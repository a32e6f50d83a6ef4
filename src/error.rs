//! Error types for framewire.
//!
//! Failures on a [`FramedConnection`](crate::FramedConnection) are surfaced as
//! return values, never as panics. `read` reports its failure category through
//! [`ReadError`]; the legacy one-byte markers used by wire-compatible
//! implementations are available via [`ReadError::sentinel`].

use thiserror::Error;

/// Marker byte for the timeout / not-connected failure category.
pub const TIMEOUT_SENTINEL: u8 = 0x00;

/// Marker byte for the transport / framing failure category.
pub const ERROR_SENTINEL: u8 = 0x01;

/// Failure category of a framed read.
///
/// The underlying cause is logged at the failure site (one line, with a full
/// debug event when the connection's debug flag is set); callers only see the
/// category.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// Operation attempted with no live connection.
    #[error("connection is not established")]
    NotConnected,

    /// No data became readable within the wait window.
    #[error("timed out waiting for an incoming message")]
    Timeout,

    /// The underlying receive failed mid-message.
    #[error("transport failure while receiving")]
    Transport,

    /// The length prefix could not be decoded, or declared an unacceptable
    /// length (e.g. the peer closed mid-prefix).
    #[error("message framing could not be decoded")]
    Framing,
}

impl ReadError {
    /// Collapse the category onto the two legacy one-byte markers.
    ///
    /// `NotConnected` and `Timeout` share [`TIMEOUT_SENTINEL`]; `Transport`
    /// and `Framing` share [`ERROR_SENTINEL`].
    #[inline]
    pub const fn sentinel(self) -> u8 {
        match self {
            Self::NotConnected | Self::Timeout => TIMEOUT_SENTINEL,
            Self::Transport | Self::Framing => ERROR_SENTINEL,
        }
    }

    /// Whether this failure was a timeout (as opposed to a hard error).
    #[inline]
    pub const fn is_timeout(self) -> bool {
        matches!(self, Self::Timeout)
    }
}
