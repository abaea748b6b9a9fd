//! # FLAC Decode Session
//!
//! [`FlacStream`] is the seekable PCM sample source handed to the mixer. It
//! owns the engine, the stream metadata, and the bounded overflow cache, and
//! implements the pull/push inversion described in the module docs.

use crate::decoder::{ConvertMethod, PlanarCursor};
use crate::engine::{BlockEngine, BlockSink, DecodedBlock, EngineState, FlacEngine, StreamInfo};
use crate::error::{DecodeError, Result};
use crate::traits::{duration_to_frames, frames_to_duration, ByteSource, SampleStream};
use std::time::Duration;
use tracing::{debug, warn};

/// Overflow cache capacity in output samples. The FLAC format bounds block
/// sizes to a 16-bit frame count, so one whole stereo block always fits in a
/// cache this size, and the cache is drained at the start of every read.
const SAMPLE_CACHE_SIZE: usize = 65536;

// ============================================================================
// Overflow Cache
// ============================================================================

/// Fixed-capacity holding area for decoded samples the in-flight pull
/// request did not consume.
struct SampleCache {
    data: Box<[i16]>,
    /// Read cursor into `data`; meaningful only while `fill > 0`.
    read_pos: usize,
    /// Unread samples currently buffered. Always a whole number of frames.
    fill: usize,
}

impl SampleCache {
    fn new() -> Self {
        Self {
            data: vec![0i16; SAMPLE_CACHE_SIZE].into_boxed_slice(),
            read_pos: 0,
            fill: 0,
        }
    }

    /// Copy up to `out.len()` buffered samples into the front of `out`,
    /// returning the number copied.
    fn drain(&mut self, out: &mut [i16]) -> usize {
        let n = self.fill.min(out.len());
        out[..n].copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        self.fill -= n;
        n
    }

    fn clear(&mut self) {
        self.read_pos = 0;
        self.fill = 0;
    }

    fn is_empty(&self) -> bool {
        self.fill == 0
    }
}

// ============================================================================
// Session State + Write Sink
// ============================================================================

/// State shared between the session and its per-read sink.
struct SessionState {
    info: StreamInfo,
    /// Index + 1 of the last frame to emit; 0 while unknown.
    last_frame: u64,
    /// `true` once the engine reported end of stream or the known last
    /// frame has been produced. Samples may still sit in the cache.
    last_frame_written: bool,
    convert: ConvertMethod,
    cache: SampleCache,
}

impl SessionState {
    fn new() -> Self {
        Self {
            info: StreamInfo::default(),
            last_frame: 0,
            last_frame_written: false,
            convert: ConvertMethod::Generic,
            cache: SampleCache::new(),
        }
    }

    fn out_channels(&self) -> usize {
        self.info.out_channels()
    }
}

/// The engine's callback receiver for the duration of one `read_buffer`
/// call (or metadata priming, with an empty destination).
///
/// Holds the current destination and write cursor explicitly; the engine
/// invokes [`write_block`](BlockSink::write_block) synchronously while the
/// driving read is still on the stack.
struct PcmSink<'a> {
    state: &'a mut SessionState,
    dst: &'a mut [i16],
    written: usize,
}

impl BlockSink for PcmSink<'_> {
    fn stream_info(&mut self, info: &StreamInfo) {
        self.state.info = info.clone();
        self.state.convert = ConvertMethod::select(info.out_channels(), info.bits_per_sample);
        debug!(
            channels = info.channels,
            rate = info.sample_rate,
            bits = info.bits_per_sample,
            total_frames = info.total_frames,
            method = ?self.state.convert,
            "stream metadata received"
        );
    }

    fn write_block(&mut self, block: &DecodedBlock<'_>) -> bool {
        let state = &mut *self.state;
        let channels = state.out_channels();
        let bits = state.info.bits_per_sample;
        let wanted = self.dst.len() - self.written;

        // Either the cache is empty or the pull request was already fully
        // satisfied; never both partially fulfilled.
        debug_assert!(state.cache.is_empty() || wanted == 0);
        debug_assert_eq!(wanted % channels.max(1), 0);

        // Clip the block if it reaches the emission boundary. A block that
        // ends exactly at the boundary keeps all its frames but still marks
        // the last frame as written, so end-of-data flips without another
        // engine round trip.
        let mut frames = block.frames;
        if state.last_frame != 0 && block.start_frame + frames as u64 >= state.last_frame - 1 {
            let limit = (state.last_frame - 1).saturating_sub(block.start_frame) as usize;
            frames = frames.min(limit);
            state.last_frame_written = true;
        }

        let mut cursor = PlanarCursor::new(block.channels);
        let mut samples = frames * channels;

        // Convert straight into the caller's buffer first.
        if wanted > 0 {
            let copy = wanted.min(samples);
            state.convert.convert(
                &mut self.dst[self.written..self.written + copy],
                &mut cursor,
                bits,
            );
            self.written += copy;
            samples -= copy;
        }

        // Whatever the request did not need goes into the overflow cache.
        if samples > 0 {
            if state.cache.is_empty() {
                state.cache.read_pos = 0;
            }
            let start = state.cache.read_pos + state.cache.fill;
            assert!(
                start + samples <= SAMPLE_CACHE_SIZE,
                "decoded block of {samples} samples overflows the sample cache"
            );
            state.convert.convert(
                &mut state.cache.data[start..start + samples],
                &mut cursor,
                bits,
            );
            state.cache.fill += samples;
        }

        true
    }

    fn decode_error(&mut self, message: &str) {
        // Recoverable frame problems; the engine keeps decoding.
        debug!("non-fatal decode problem: {message}");
    }
}

// ============================================================================
// FlacStream
// ============================================================================

/// A seekable, pull-based 16-bit PCM view of one FLAC stream.
///
/// Generic over the engine so the session logic can be driven by a scripted
/// engine in tests; production streams come from [`open_flac_stream`] and
/// use the bundled [`FlacEngine`].
pub struct FlacStream<E: BlockEngine> {
    engine: E,
    state: SessionState,
    length: Duration,
}

impl<E: BlockEngine> FlacStream<E> {
    /// Bind a session to `engine` and drive it through metadata-only
    /// processing.
    ///
    /// Never fails: on engine or metadata failure the session is left in
    /// the failed state (`channels == 0`), where every read and seek
    /// reports [`DecodeError::NotInitialized`] and
    /// [`end_of_data`](SampleStream::end_of_data) is immediately `true`.
    /// Factories are expected to detect that and hand out nothing.
    pub fn new(mut engine: E) -> Self {
        let mut state = SessionState::new();

        let mut no_out: [i16; 0] = [];
        let parsed = {
            let mut sink = PcmSink {
                state: &mut state,
                dst: &mut no_out,
                written: 0,
            };
            engine.read_metadata(&mut sink)
        };

        let mut length = Duration::ZERO;
        if parsed && state.out_channels() > 0 {
            if state.info.total_frames > 0 {
                state.last_frame = state.info.total_frames + 1;
                length = frames_to_duration(state.last_frame - 1, state.info.sample_rate);
            }
        } else {
            warn!("could not create FLAC stream: metadata unreadable or no channels");
            state.info.channels = 0;
        }

        Self {
            engine,
            state,
            length,
        }
    }

    /// Stream metadata as reported by the engine. Channels are the true
    /// source count, not the clamped output count.
    pub fn info(&self) -> &StreamInfo {
        &self.state.info
    }
}

impl<E: BlockEngine> SampleStream for FlacStream<E> {
    fn is_stereo(&self) -> bool {
        self.state.info.channels >= 2
    }

    fn rate(&self) -> u32 {
        self.state.info.sample_rate
    }

    fn length(&self) -> Duration {
        self.length
    }

    fn end_of_data(&self) -> bool {
        self.state.out_channels() == 0
            || (self.state.last_frame_written && self.state.cache.is_empty())
    }

    fn seek(&mut self, to: Duration) -> Result<()> {
        if self.state.out_channels() == 0 {
            return Err(DecodeError::NotInitialized);
        }

        // Anything buffered before the seek is stale, success or not.
        self.state.cache.clear();

        // FLAC addresses sample-frame (pair) positions; channel count does
        // not enter the target computation.
        let target = duration_to_frames(to, self.state.info.sample_rate);
        if self.engine.seek_frame(target) {
            // Only claim the last frame was written when we are sure.
            self.state.last_frame_written =
                self.state.last_frame != 0 && target >= self.state.last_frame - 1;
            Ok(())
        } else {
            warn!("seek to {to:?} (frame {target}) rejected by the engine");
            Err(DecodeError::SeekFailed(to))
        }
    }

    fn read_buffer(&mut self, out: &mut [i16]) -> Result<usize> {
        let channels = self.state.out_channels();
        if channels == 0 {
            warn!("stream not successfully initialized, cannot read");
            return Err(DecodeError::NotInitialized);
        }

        assert!(
            out.len() % channels == 0,
            "requested sample count {} is not a multiple of the channel count {}",
            out.len(),
            channels
        );

        // Buffered leftovers from the previous call come first.
        debug_assert_eq!(self.state.cache.fill % channels, 0);
        let mut written = self.state.cache.drain(out);

        // Keep poking the engine for one block at a time until the request
        // is satisfied or we run out of data.
        while !self.state.last_frame_written
            && written < out.len()
            && self.engine.state() == EngineState::Ready
        {
            debug_assert!(self.state.cache.is_empty());
            let mut sink = PcmSink {
                state: &mut self.state,
                dst: &mut *out,
                written,
            };
            let _ = self.engine.process_block(&mut sink);
            written = sink.written;

            if self.engine.state() == EngineState::EndOfStream {
                self.state.last_frame_written = true;
            }
        }

        match self.engine.state() {
            EngineState::EndOfStream => {
                self.state.last_frame_written = true;
                debug_assert_eq!(written % channels, 0);
                Ok(written)
            }
            EngineState::Ready => {
                debug_assert_eq!(written % channels, 0);
                Ok(written)
            }
            EngineState::Failed => {
                warn!("engine left its healthy state while decoding");
                Err(DecodeError::DecodeFailed(
                    "engine failed while processing a block".into(),
                ))
            }
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Open `source` as a FLAC stream.
///
/// Returns `None` (never an error, never a half-usable session) when the
/// bytes are not a decodable FLAC stream: engine attach failure, unreadable
/// metadata, or a zero channel count. Failures are logged as warnings.
pub fn open_flac_stream(source: Box<dyn ByteSource>) -> Option<FlacStream<FlacEngine>> {
    let engine = match FlacEngine::new(source) {
        Ok(engine) => engine,
        Err(e) => {
            warn!("could not open FLAC stream: {e}");
            return None;
        }
    };

    let stream = FlacStream::new(engine);
    if stream.end_of_data() {
        warn!("could not create FLAC stream: no decodable audio");
        None
    } else {
        Some(stream)
    }
}
