//! # Decode Error Types
//!
//! Error types for the FLAC sample source.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while opening, reading, or seeking a stream.
#[derive(Error, Debug)]
pub enum DecodeError {
    // ========================================================================
    // Format Errors
    // ========================================================================
    /// The byte stream is not a decodable FLAC stream.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Operation attempted on a session whose stream metadata was never
    /// successfully read (the failed state).
    #[error("Stream not successfully initialized")]
    NotInitialized,

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// The engine left its healthy state while processing a block.
    #[error("Decoding error: {0}")]
    DecodeFailed(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// The engine rejected an absolute-seek target. The overflow cache has
    /// already been discarded; the playback position is indeterminate.
    #[error("Seek to {0:?} failed")]
    SeekFailed(Duration),

    // ========================================================================
    // Source Errors
    // ========================================================================
    /// I/O failure while opening or probing the byte source.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DecodeError {
    /// Returns `true` if this error is related to the stream format rather
    /// than a runtime decode/IO failure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            DecodeError::InvalidFormat(_) | DecodeError::NotInitialized
        )
    }

    /// Returns `true` if the session may still be usable after this error
    /// (a failed seek leaves the stream open, only the position is lost).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::SeekFailed(_))
    }
}

/// Result type for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
