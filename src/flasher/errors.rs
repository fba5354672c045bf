//! Error taxonomy of the flashing core.
//!
//! Two families, both fatal for the operation that produced them:
//!
//! * [`ConnectError`] ends the whole connect attempt; the caller may retry
//!   the connect from scratch.
//! * [`TransferError`] ends the current transfer; there is no partial
//!   resume, a retry means a fresh begin-flash starting at byte zero.
//!
//! Nothing in this crate retries on its own; retry policy belongs to the
//! orchestrating caller.

use thiserror::Error;

use crate::loader::ErrorCode;

/// Code used for [`TransferError::VerifyFailed`] when the target ran the
/// verification and reported a content mismatch (as opposed to failing to
/// run it at all).
pub const VERIFY_MISMATCH: ErrorCode = 0x06;

/// Errors produced while negotiating a session with the target loader.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The loader handshake failed. The target may not be in download mode,
    /// or may not be connected at all.
    #[error("loader handshake failed (code {0:#x})")]
    HandshakeFailed(ErrorCode),

    /// The target accepted a transmission-rate change but completing it
    /// failed, either on the wire or while reconfiguring the local
    /// transport. The two ends are now desynchronized, so this is fatal.
    #[error("transmission rate change failed (code {0:#x}), link is desynchronized")]
    RateChangeFailed(ErrorCode),
}

/// Errors produced while transferring one image into target flash.
///
/// `BeginFailed` and `ChunkWriteFailed` leave the target's erase/write state
/// undefined for the region; the flash contents must be considered garbage
/// until a transfer for that region completes successfully.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    /// The begin-flash request (which pre-erases the region) was rejected.
    #[error("begin-flash request failed (code {0:#x})")]
    BeginFailed(ErrorCode),

    /// The source ran out of bytes before delivering the declared size.
    #[error("image source truncated: got {got} of {expected} declared bytes")]
    SourceTruncated { expected: u64, got: u64 },

    /// A chunk write was rejected. Carries the loader code and the number of
    /// bytes successfully written before the failing chunk (the failing
    /// chunk's start offset).
    #[error("chunk write failed (code {0:#x}) at byte offset {1}")]
    ChunkWriteFailed(ErrorCode, u64),

    /// All bytes were written but the post-write verification failed or
    /// reported a mismatch. The flash contents are suspect.
    #[error("flash verification failed (code {0:#x})")]
    VerifyFailed(ErrorCode),
}

impl TransferError {
    /// Byte offset at which the transfer failed, for errors that carry one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            TransferError::ChunkWriteFailed(_, offset) => Some(*offset),
            TransferError::SourceTruncated { got, .. } => Some(*got),
            _ => None,
        }
    }
}
