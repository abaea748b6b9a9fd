//! End-to-end session tests driven by a scripted engine.
//!
//! The scripted engine produces a deterministic planar sample pattern in
//! configurable block sizes, which lets these tests pin down the pull/push
//! adapter, the overflow cache, clipping at the stream end, and seek
//! bookkeeping without any encoded FLAC data.

use flac_source::traits::{duration_to_frames, frames_to_duration};
use flac_source::{
    BlockEngine, BlockSink, DecodeError, DecodedBlock, EngineState, FlacStream, SampleStream,
    StreamInfo,
};
use std::time::Duration;

const RATE: u32 = 44100;

/// Deterministic per-channel sample value, kept within the signed range of
/// the given bit depth.
fn sample_value(ch: usize, frame: usize, bits: u8) -> i32 {
    let span = 1i64 << (bits - 1);
    (((frame as i64 * 7 + ch as i64 * 13) % span) - span / 2) as i32
}

/// The 16-bit value the conversion layer is expected to emit for one
/// native-depth sample.
fn expected_output(v: i32, bits: u8) -> i16 {
    if bits < 16 {
        (v << (16 - bits)) as i16
    } else if bits > 16 {
        (v >> (bits - 16)) as i16
    } else {
        v as i16
    }
}

struct ScriptedEngine {
    info: StreamInfo,
    /// Planar sample data for the whole stream, one inner vec per channel.
    samples: Vec<Vec<i32>>,
    block_frames: usize,
    pos: u64,
    state: EngineState,
    /// Report one recoverable decode error when reaching this frame index.
    corrupt_at: Option<u64>,
    /// Fail fatally when reaching this frame index.
    fail_at: Option<u64>,
}

impl ScriptedEngine {
    fn new(channels: u16, bits: u8, total: u64, block_frames: usize) -> Self {
        let samples = (0..channels as usize)
            .map(|ch| {
                (0..total as usize)
                    .map(|frame| sample_value(ch, frame, bits))
                    .collect()
            })
            .collect();
        Self {
            info: StreamInfo {
                channels,
                sample_rate: RATE,
                bits_per_sample: bits,
                total_frames: total,
                max_block_size: block_frames as u16,
            },
            samples,
            block_frames,
            pos: 0,
            state: EngineState::Ready,
            corrupt_at: None,
            fail_at: None,
        }
    }

    fn total(&self) -> u64 {
        self.samples.first().map_or(0, |c| c.len() as u64)
    }
}

impl BlockEngine for ScriptedEngine {
    fn read_metadata(&mut self, sink: &mut dyn BlockSink) -> bool {
        sink.stream_info(&self.info);
        true
    }

    fn process_block(&mut self, sink: &mut dyn BlockSink) -> bool {
        if self.state != EngineState::Ready {
            return self.state == EngineState::EndOfStream;
        }
        if self.fail_at.is_some_and(|at| self.pos >= at) {
            self.state = EngineState::Failed;
            return false;
        }
        if self.pos >= self.total() {
            self.state = EngineState::EndOfStream;
            return true;
        }
        if self.corrupt_at == Some(self.pos) {
            self.corrupt_at = None;
            sink.decode_error("lost frame sync");
            return true;
        }

        let start = self.pos as usize;
        let frames = self.block_frames.min(self.samples[0].len() - start);
        let planes: Vec<&[i32]> = self
            .samples
            .iter()
            .map(|c| &c[start..start + frames])
            .collect();
        let block = DecodedBlock {
            channels: &planes,
            frames,
            start_frame: self.pos,
        };
        self.pos += frames as u64;
        if sink.write_block(&block) {
            true
        } else {
            self.state = EngineState::Failed;
            false
        }
    }

    fn seek_frame(&mut self, frame: u64) -> bool {
        if frame > self.total() {
            return false;
        }
        self.pos = frame;
        self.state = EngineState::Ready;
        true
    }

    fn state(&self) -> EngineState {
        self.state
    }
}

/// Interleaved 16-bit rendering of the whole scripted stream, for
/// comparison against what the session produces.
fn expected_stream(channels: usize, bits: u8, total: usize) -> Vec<i16> {
    let out_channels = channels.min(2);
    let mut out = Vec::with_capacity(total * out_channels);
    for frame in 0..total {
        for ch in 0..out_channels {
            out.push(expected_output(sample_value(ch, frame, bits), bits));
        }
    }
    out
}

#[test]
fn test_example_scenario_stereo_16bit_8_frames() {
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, 8, 4));
    assert!(stream.is_stereo());
    assert_eq!(stream.rate(), RATE);
    assert!(!stream.end_of_data());

    let mut out = [0i16; 16];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 16);
    assert_eq!(&out[..], &expected_stream(2, 16, 8)[..]);
    assert!(stream.end_of_data());

    // Further reads produce zero samples, not an error.
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 0);
    assert!(stream.end_of_data());
}

#[test]
fn test_length_round_trips_to_total_frames() {
    let stream = FlacStream::new(ScriptedEngine::new(2, 16, 123_456, 4096));
    assert_eq!(duration_to_frames(stream.length(), RATE), 123_456);
    assert_eq!(stream.length(), frames_to_duration(123_456, RATE));
}

#[test]
fn test_unknown_total_reports_zero_length_and_ends_via_engine() {
    let mut engine = ScriptedEngine::new(1, 16, 32, 16);
    engine.info.total_frames = 0;
    let mut stream = FlacStream::new(engine);

    assert_eq!(stream.length(), Duration::ZERO);
    assert!(!stream.end_of_data());

    // The stream still plays out fully; end of data comes from the engine
    // reporting end of stream rather than from the clip boundary.
    let mut out = vec![0i16; 64];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 32);
    assert!(stream.end_of_data());
}

#[test]
fn test_chunked_reads_match_single_read() {
    let total = 1000u64;
    let whole = {
        let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, total, 96));
        let mut out = vec![0i16; total as usize * 2];
        assert_eq!(stream.read_buffer(&mut out).unwrap(), out.len());
        out
    };
    assert_eq!(whole, expected_stream(2, 16, total as usize));

    // Uneven chunk sizes, all multiples of the channel count.
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, total, 96));
    let mut chunked = Vec::new();
    for chunk in [2usize, 30, 256, 256, 1456] {
        let mut out = vec![0i16; chunk];
        let got = stream.read_buffer(&mut out).unwrap();
        chunked.extend_from_slice(&out[..got]);
        if got < chunk {
            break;
        }
    }
    assert_eq!(chunked, whole);
    assert!(stream.end_of_data());
}

#[test]
fn test_overflow_cache_carries_block_excess_across_reads() {
    // Blocks of 50 frames against reads of 30 samples force every read
    // after the first to start from cached leftovers.
    let mut stream = FlacStream::new(ScriptedEngine::new(1, 16, 200, 50));
    let expected = expected_stream(1, 16, 200);

    let mut produced = Vec::new();
    loop {
        let mut out = [0i16; 30];
        let got = stream.read_buffer(&mut out).unwrap();
        if got == 0 {
            break;
        }
        produced.extend_from_slice(&out[..got]);
    }
    assert_eq!(produced, expected);
}

#[test]
fn test_seek_to_start_after_end_of_data() {
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, 64, 16));
    let mut out = vec![0i16; 128];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 128);
    assert!(stream.end_of_data());

    stream.seek(Duration::ZERO).unwrap();
    assert!(!stream.end_of_data());

    let mut again = vec![0i16; 128];
    assert_eq!(stream.read_buffer(&mut again).unwrap(), 128);
    assert_eq!(again, out);
}

#[test]
fn test_seek_is_idempotent() {
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, 4096, 256));
    let target = frames_to_duration(1024, RATE);

    stream.seek(target).unwrap();
    let mut first = vec![0i16; 512];
    assert_eq!(stream.read_buffer(&mut first).unwrap(), 512);

    stream.seek(target).unwrap();
    stream.seek(target).unwrap();
    let mut second = vec![0i16; 512];
    assert_eq!(stream.read_buffer(&mut second).unwrap(), 512);

    assert_eq!(first, second);
    assert_eq!(&first[..], &expected_stream(2, 16, 4096)[2048..2560]);
}

#[test]
fn test_seek_discards_cached_samples() {
    // First read leaves 20 frames of block excess in the cache; the seek
    // must discard them so the next read starts at the target.
    let mut stream = FlacStream::new(ScriptedEngine::new(1, 16, 100, 50));
    let mut out = [0i16; 30];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 30);

    stream.seek(frames_to_duration(80, RATE)).unwrap();
    let mut tail = [0i16; 20];
    assert_eq!(stream.read_buffer(&mut tail).unwrap(), 20);
    assert_eq!(&tail[..], &expected_stream(1, 16, 100)[80..]);
    assert!(stream.end_of_data());
}

#[test]
fn test_seek_to_length_marks_stream_done() {
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, 64, 16));
    stream.seek(stream.length()).unwrap();
    assert!(stream.end_of_data());

    let mut out = [0i16; 8];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 0);
}

#[test]
fn test_rejected_seek_is_an_error() {
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, 64, 16));
    let past_end = frames_to_duration(1_000_000, RATE);
    assert!(matches!(
        stream.seek(past_end),
        Err(DecodeError::SeekFailed(_))
    ));
}

#[test]
fn test_fatal_engine_failure_surfaces_as_read_error() {
    let mut engine = ScriptedEngine::new(2, 16, 256, 32);
    engine.fail_at = Some(64);
    let mut stream = FlacStream::new(engine);

    let mut out = vec![0i16; 1024];
    assert!(matches!(
        stream.read_buffer(&mut out),
        Err(DecodeError::DecodeFailed(_))
    ));
}

#[test]
fn test_recoverable_decode_error_does_not_stop_the_stream() {
    let mut engine = ScriptedEngine::new(1, 16, 96, 32);
    engine.corrupt_at = Some(32);
    let mut stream = FlacStream::new(engine);

    let mut out = vec![0i16; 96];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 96);
    assert_eq!(out, expected_stream(1, 16, 96));
}

#[test]
fn test_mono_8bit_scales_up_by_eight_bits() {
    let mut stream = FlacStream::new(ScriptedEngine::new(1, 8, 64, 16));
    let mut out = [0i16; 64];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 64);
    for (frame, &sample) in out.iter().enumerate() {
        let v = sample_value(0, frame, 8);
        assert_eq!(sample as i32, v << 8);
    }
}

#[test]
fn test_24bit_stereo_uses_generic_narrowing() {
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 24, 32, 8));
    let mut out = [0i16; 64];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 64);
    assert_eq!(&out[..], &expected_stream(2, 24, 32)[..]);
}

#[test]
fn test_surround_source_is_clamped_to_stereo() {
    let mut stream = FlacStream::new(ScriptedEngine::new(6, 16, 16, 8));
    assert!(stream.is_stereo());

    // Output carries only the first two channels; 16 frames = 32 samples.
    let mut out = [0i16; 32];
    assert_eq!(stream.read_buffer(&mut out).unwrap(), 32);
    assert_eq!(&out[..], &expected_stream(6, 16, 16)[..]);
    assert!(stream.end_of_data());
}

#[test]
#[should_panic(expected = "not a multiple of the channel count")]
fn test_read_length_must_be_frame_aligned() {
    let mut stream = FlacStream::new(ScriptedEngine::new(2, 16, 64, 16));
    let mut out = [0i16; 15];
    let _ = stream.read_buffer(&mut out);
}
