//! # Core Traits
//!
//! The two seams of the crate: [`ByteSource`], the synchronous byte supplier
//! the decoding engine pulls from, and [`SampleStream`], the pull surface the
//! downstream mixer consumes.
//!
//! Also defines the time ↔ sample-frame conversion convention shared by
//! [`SampleStream::length`] and [`SampleStream::seek`].

use crate::error::Result;
use std::time::Duration;

// ============================================================================
// Byte Source
// ============================================================================

/// A seekable, readable stream of bytes.
///
/// This is the raw input contract of the decoding engine: a fully
/// synchronous, always-available source. There is no notion of "no data
/// yet"; a read that returns 0 bytes while [`eos`](ByteSource::eos) is
/// still `false` is treated as a hard error by the engine adapter.
///
/// The source is shared exclusively with one decode session; no concurrent
/// readers exist.
///
/// `Send + Sync` is required because the decoding engine's media-source
/// abstraction demands it, even though all access is single-threaded.
#[cfg_attr(test, mockall::automock)]
pub trait ByteSource: Send + Sync {
    /// Read up to `buf.len()` bytes, returning the number actually read.
    ///
    /// Returns 0 only at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Seek to an absolute byte offset. Returns `true` if the source is now
    /// positioned at exactly `offset`.
    ///
    /// The engine only ever issues absolute seeks.
    fn seek(&mut self, offset: u64) -> bool;

    /// Current byte position.
    fn pos(&self) -> u64;

    /// Total size of the stream in bytes.
    fn size(&self) -> u64;

    /// `true` once the read position has reached the end of the stream.
    fn eos(&self) -> bool;
}

// ============================================================================
// Sample Stream
// ============================================================================

/// A pull-based, seekable source of 16-bit interleaved PCM samples.
///
/// This is the surface the mixer sees. One *sample* is a single `i16` value;
/// one *frame* is one sample per output channel. All sample counts passed to
/// [`read_buffer`](SampleStream::read_buffer) must be whole frames.
///
/// ## Contract
///
/// - `read_buffer` and `seek` are synchronous and must not be called
///   reentrantly on the same session. `&mut self` enforces this statically.
/// - `read_buffer` produces fewer samples than requested only at genuine
///   end of stream, never spuriously.
/// - `seek` is not transactional: a failed seek has already discarded any
///   buffered-but-unread samples, and the position is indeterminate.
pub trait SampleStream {
    /// `true` if the source stream carries two or more channels.
    ///
    /// Output is clamped to two channels, but this reports from the true
    /// channel count of the stream.
    fn is_stereo(&self) -> bool;

    /// Sample rate in Hz.
    fn rate(&self) -> u32;

    /// Total playable length of the stream.
    fn length(&self) -> Duration;

    /// `true` once the stream can produce no further samples: either the
    /// session is in the failed state, or the last frame has been decoded
    /// and the overflow cache is fully drained.
    fn end_of_data(&self) -> bool;

    /// Seek to an absolute time position.
    ///
    /// The target frame index is computed from `to` and the sample rate as a
    /// frame-pair position, independent of channel count. The overflow cache
    /// is cleared unconditionally, even when the seek fails.
    ///
    /// # Errors
    ///
    /// [`DecodeError::SeekFailed`](crate::DecodeError::SeekFailed) if the
    /// engine rejects the target.
    fn seek(&mut self, to: Duration) -> Result<()>;

    /// Fill `out` with decoded samples, returning the number produced.
    ///
    /// Drains any previously buffered samples first, then decodes one block
    /// at a time until the request is satisfied or the stream ends.
    ///
    /// # Panics
    ///
    /// Panics if `out.len()` is not a multiple of the output channel count;
    /// that is a programming error on the caller's side, not a runtime
    /// condition.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::NotInitialized`](crate::DecodeError::NotInitialized)
    ///   if the session is in the failed state.
    /// - [`DecodeError::DecodeFailed`](crate::DecodeError::DecodeFailed) if
    ///   the engine reports an unhealthy state mid-stream. No samples from
    ///   the failing call are returned, but samples already drained from the
    ///   cache in earlier calls remain valid.
    fn read_buffer(&mut self, out: &mut [i16]) -> Result<usize>;
}

// ============================================================================
// Time / Frame Conversion
// ============================================================================

/// Convert a sample-frame count to a time value at the given rate.
///
/// Truncates to nanosecond precision; [`duration_to_frames`] rounds to
/// nearest so the pair round-trips exactly for any real-world sample rate.
pub fn frames_to_duration(frames: u64, rate: u32) -> Duration {
    if rate == 0 {
        return Duration::ZERO;
    }
    let nanos = frames as u128 * 1_000_000_000 / rate as u128;
    Duration::from_nanos(nanos as u64)
}

/// Convert a time value to an absolute sample-frame index at the given rate.
pub fn duration_to_frames(d: Duration, rate: u32) -> u64 {
    (d.as_nanos() * rate as u128 + 500_000_000).div_euclid(1_000_000_000) as u64
}
