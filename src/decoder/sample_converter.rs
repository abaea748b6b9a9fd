//! # Sample Format Conversion
//!
//! Converts the engine's native-depth planar samples (4 to 32 bits per sample,
//! one `i32` slice per channel) into the fixed output format: 16-bit signed,
//! interleaved when stereo.
//!
//! Conversion runs on every decoded block in a realtime audio path, so the
//! overwhelmingly common shapes (mono/stereo at 8 or 16 bits) get
//! specialized paths that process four output samples per step and carry no
//! per-sample channel loop. Everything else goes through a generic path with
//! one precomputed shift.
//!
//! The method is selected once, when stream metadata arrives (channel count
//! and bit depth are fixed for the life of a stream), and reused for every
//! block thereafter.

use crate::decoder::MAX_OUTPUT_CHANNELS;

/// Bit width of the output sample format.
pub(crate) const OUT_BITS: u8 = 16;

/// Advancing read cursor over a block's planar channel data, clamped to the
/// output channel limit.
///
/// One decoded block may be converted in two pieces (straight into the
/// caller's buffer, then the remainder into the overflow cache); the cursor
/// carries the per-channel positions across those calls.
pub(crate) struct PlanarCursor<'a> {
    channels: [&'a [i32]; MAX_OUTPUT_CHANNELS],
    used: usize,
}

impl<'a> PlanarCursor<'a> {
    /// Build a cursor over the first `MAX_OUTPUT_CHANNELS` channels of a
    /// block; any further channels are dropped.
    pub(crate) fn new(channels: &[&'a [i32]]) -> Self {
        let used = channels.len().min(MAX_OUTPUT_CHANNELS);
        let mut clamped: [&'a [i32]; MAX_OUTPUT_CHANNELS] = [&[]; MAX_OUTPUT_CHANNELS];
        clamped[..used].copy_from_slice(&channels[..used]);
        Self {
            channels: clamped,
            used,
        }
    }

    /// Number of channels the cursor feeds (1 or 2).
    pub(crate) fn channel_count(&self) -> usize {
        self.used
    }

    /// Sample frames left unconsumed.
    pub(crate) fn remaining_frames(&self) -> usize {
        self.channels[..self.used]
            .iter()
            .map(|ch| ch.len())
            .min()
            .unwrap_or(0)
    }

    fn advance(&mut self, frames: usize) {
        for ch in &mut self.channels[..self.used] {
            *ch = &ch[frames..];
        }
    }
}

/// Conversion strategy, chosen once per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConvertMethod {
    /// Any bit depth, any clamped channel count. Slowest path.
    Generic,
    /// 1 channel, 16-bit, no scaling.
    MonoNoScale,
    /// 1 channel, scaling up from 8-bit.
    Mono8Bit,
    /// 2 channels, 16-bit, interleave only.
    StereoNoScale,
    /// 2 channels, interleave and scale up from 8-bit.
    Stereo8Bit,
}

impl ConvertMethod {
    /// Pick the best method for a stream shape. Called once at
    /// metadata-received time; never re-selected mid-stream.
    pub(crate) fn select(out_channels: usize, bits_per_sample: u8) -> Self {
        match (out_channels, bits_per_sample) {
            (1, 8) => ConvertMethod::Mono8Bit,
            (1, OUT_BITS) => ConvertMethod::MonoNoScale,
            (2, 8) => ConvertMethod::Stereo8Bit,
            (2, OUT_BITS) => ConvertMethod::StereoNoScale,
            _ => ConvertMethod::Generic,
        }
    }

    /// Convert exactly `dst.len()` output samples, consuming
    /// `dst.len() / channels` frames from the cursor.
    ///
    /// `dst.len()` must be a whole number of frames, and the cursor must
    /// hold at least that many.
    pub(crate) fn convert(self, dst: &mut [i16], src: &mut PlanarCursor<'_>, bits_per_sample: u8) {
        if dst.is_empty() {
            return;
        }
        let channels = src.channel_count();
        debug_assert!(channels > 0);
        debug_assert_eq!(dst.len() % channels, 0);
        let frames = dst.len() / channels;
        debug_assert!(frames <= src.remaining_frames());

        match self {
            ConvertMethod::MonoNoScale => mono_into(dst, src.channels[0], 0),
            ConvertMethod::Mono8Bit => mono_into(dst, src.channels[0], (OUT_BITS - 8) as u32),
            ConvertMethod::StereoNoScale => {
                stereo_into(dst, src.channels[0], src.channels[1], 0)
            }
            ConvertMethod::Stereo8Bit => {
                stereo_into(dst, src.channels[0], src.channels[1], (OUT_BITS - 8) as u32)
            }
            ConvertMethod::Generic => generic_into(dst, src, bits_per_sample),
        }

        src.advance(frames);
    }
}

/// 1 channel, optional scale-up. Four samples per step.
fn mono_into(dst: &mut [i16], src: &[i32], shift: u32) {
    // The source plane may be longer than this piece of the conversion.
    let src = &src[..dst.len()];
    let mut out = dst.chunks_exact_mut(4);
    let mut inp = src.chunks_exact(4);
    for (d, s) in (&mut out).zip(&mut inp) {
        d[0] = (s[0] as i16) << shift;
        d[1] = (s[1] as i16) << shift;
        d[2] = (s[2] as i16) << shift;
        d[3] = (s[3] as i16) << shift;
    }
    for (d, s) in out.into_remainder().iter_mut().zip(inp.remainder()) {
        *d = (*s as i16) << shift;
    }
}

/// 2 channels, interleave, optional scale-up. Two frames per step.
fn stereo_into(dst: &mut [i16], left: &[i32], right: &[i32], shift: u32) {
    debug_assert_eq!(dst.len() % 2, 0);

    // The source planes may be longer than this piece of the conversion.
    let frames = dst.len() / 2;
    let mut out = dst.chunks_exact_mut(4);
    let mut l = left[..frames].chunks_exact(2);
    let mut r = right[..frames].chunks_exact(2);
    for ((d, l), r) in (&mut out).zip(&mut l).zip(&mut r) {
        d[0] = (l[0] as i16) << shift;
        d[1] = (r[0] as i16) << shift;
        d[2] = (l[1] as i16) << shift;
        d[3] = (r[1] as i16) << shift;
    }

    let tail = out.into_remainder();
    if !tail.is_empty() {
        tail[0] = (l.remainder()[0] as i16) << shift;
        tail[1] = (r.remainder()[0] as i16) << shift;
    }
}

/// All-purpose conversion: per-frame channel loop with one precomputed
/// shift. Handles every bit depth in 4..=32 and both channel shapes.
fn generic_into(dst: &mut [i16], src: &PlanarCursor<'_>, bits_per_sample: u8) {
    let channels = src.channel_count();

    if bits_per_sample < OUT_BITS {
        let shift = (OUT_BITS - bits_per_sample) as u32;
        for (i, frame) in dst.chunks_exact_mut(channels).enumerate() {
            for (ch, slot) in frame.iter_mut().enumerate() {
                *slot = (src.channels[ch][i] as i16) << shift;
            }
        }
    } else if bits_per_sample > OUT_BITS {
        let shift = (bits_per_sample - OUT_BITS) as u32;
        for (i, frame) in dst.chunks_exact_mut(channels).enumerate() {
            for (ch, slot) in frame.iter_mut().enumerate() {
                *slot = (src.channels[ch][i] >> shift) as i16;
            }
        }
    } else {
        for (i, frame) in dst.chunks_exact_mut(channels).enumerate() {
            for (ch, slot) in frame.iter_mut().enumerate() {
                *slot = src.channels[ch][i] as i16;
            }
        }
    }
}
