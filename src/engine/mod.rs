//! # Block Decoding Engine Contract
//!
//! The session layer does not talk to a FLAC library directly; it drives an
//! engine through this contract and receives decoded blocks through a sink.
//!
//! ## Control Inversion
//!
//! The engine is a push-style producer: each call to
//! [`BlockEngine::process_block`] synchronously invokes zero or more sink
//! callbacks on the caller's thread before returning. The sink object is
//! owned, short-lived state threaded explicitly through every call; there
//! is no global callback registration and no ambient context.
//!
//! ## State Machine
//!
//! The session only ever distinguishes three engine conditions, captured by
//! [`EngineState`]: healthy and positioned before the next frame
//! ([`Ready`](EngineState::Ready)), the stream is exhausted
//! ([`EndOfStream`](EngineState::EndOfStream)), or decoding cannot continue
//! ([`Failed`](EngineState::Failed)).

mod symphonia;

pub use self::symphonia::FlacEngine;

use serde::{Deserialize, Serialize};

/// Stream-level metadata reported by the engine once the stream header has
/// been parsed, fixed for the life of the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// True channel count of the source stream. Output conversion clamps to
    /// two channels, but this field is never clamped.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Native bits per sample (4..=32).
    pub bits_per_sample: u8,
    /// Total number of sample frames in the stream, 0 if unknown.
    pub total_frames: u64,
    /// Maximum block size in frames, as declared by the stream header.
    /// Bounded to a 16-bit value by the format.
    pub max_block_size: u16,
}

impl StreamInfo {
    /// Channel count used for output conversion (clamped to stereo).
    pub fn out_channels(&self) -> usize {
        (self.channels as usize).min(crate::decoder::MAX_OUTPUT_CHANNELS)
    }
}

/// Engine condition as observed between `process_block` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Healthy: positioned before the next decodable frame.
    Ready,
    /// The last frame of the stream has been decoded.
    EndOfStream,
    /// Decoding cannot continue from the current position.
    Failed,
}

/// One decoded block: per-channel planar sample arrays at the stream's
/// native bit depth, plus its absolute position in the stream.
///
/// Samples are `i32`-widened but carry native-depth magnitudes: an 8-bit
/// stream yields values in the signed 8-bit range, a 24-bit stream in the
/// signed 24-bit range.
#[derive(Debug)]
pub struct DecodedBlock<'a> {
    /// One slice per source channel, each `frames` long.
    pub channels: &'a [&'a [i32]],
    /// Block length in sample frames.
    pub frames: usize,
    /// Absolute index of the first frame in this block.
    pub start_frame: u64,
}

/// Receiver for the engine's push callbacks.
///
/// Implemented by the session's per-read sink; every method is invoked
/// synchronously from within a [`BlockEngine`] call.
pub trait BlockSink {
    /// Stream header parsed. Called once, before any block is written.
    fn stream_info(&mut self, info: &StreamInfo);

    /// One block decoded. Returns `false` to abort decoding.
    fn write_block(&mut self, block: &DecodedBlock<'_>) -> bool;

    /// A recoverable decode problem occurred (e.g. a frame failed sync);
    /// decoding continues.
    fn decode_error(&mut self, message: &str);
}

/// A block-based decoding engine bound to one byte source.
///
/// All methods are synchronous; `process_block` and `read_metadata` may call
/// back into the sink any number of times before returning.
pub trait BlockEngine {
    /// Drive the engine through metadata-only processing. On success the
    /// sink has received [`BlockSink::stream_info`]. Returns `false` if the
    /// header could not be parsed.
    fn read_metadata(&mut self, sink: &mut dyn BlockSink) -> bool;

    /// Decode exactly one more block, pushing it through the sink. Returns
    /// `false` on fatal failure. Reaching the end of the stream is not a
    /// failure; it is observable via [`state`](BlockEngine::state).
    fn process_block(&mut self, sink: &mut dyn BlockSink) -> bool;

    /// Seek to an absolute sample-frame index. Blocking relative to the
    /// byte source. Returns `true` on success, after which the engine is
    /// [`Ready`](EngineState::Ready) at the target position.
    fn seek_frame(&mut self, frame: u64) -> bool;

    /// Current engine condition.
    fn state(&self) -> EngineState;
}
