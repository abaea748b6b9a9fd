//! # Symphonia FLAC Engine
//!
//! Binds the `symphonia-bundle-flac` reader/decoder pair to the
//! [`BlockEngine`] contract: packets are pulled from the byte source, each
//! decoded block is pushed through the sink as planar `i32` data at the
//! stream's native bit depth.
//!
//! Symphonia normalizes its S32 output to full 32-bit scale; this adapter
//! shifts samples back down so the conversion layer sees native-depth
//! values, as the contract requires.

use crate::engine::{BlockEngine, BlockSink, DecodedBlock, EngineState, StreamInfo};
use crate::error::{DecodeError, Result};
use crate::source::SourceReader;
use crate::traits::ByteSource;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia_bundle_flac::{FlacDecoder, FlacReader};
use tracing::{debug, warn};

/// Block-based FLAC decoding engine over one byte source.
pub struct FlacEngine {
    reader: FlacReader,
    decoder: FlacDecoder,
    track_id: u32,
    info: StreamInfo,
    state: EngineState,
    /// Frames still to drop from the front of decoded blocks after a seek.
    /// Accurate seeking positions the reader at the packet containing the
    /// target, which may start before it.
    skip: u64,
    /// Per-channel scratch planes reused across blocks, holding the
    /// shifted-to-native-depth copy of the current block.
    scratch: Vec<Vec<i32>>,
}

impl FlacEngine {
    /// Attach the engine to `source`, parsing the stream header.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidFormat`] if the bytes are not a parseable FLAC
    /// stream or the header lacks a sample rate.
    pub fn new(source: Box<dyn ByteSource>) -> Result<Self> {
        let mss = MediaSourceStream::new(
            Box::new(SourceReader::new(source)),
            Default::default(),
        );

        let reader = FlacReader::try_new(mss, &FormatOptions::default()).map_err(|e| {
            DecodeError::InvalidFormat(format!("failed to parse FLAC stream: {e}"))
        })?;

        let (track_id, params) = {
            let track = reader.default_track().ok_or_else(|| {
                DecodeError::InvalidFormat("stream contains no audio track".to_string())
            })?;
            (track.id, track.codec_params.clone())
        };

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| DecodeError::InvalidFormat("missing sample rate".to_string()))?;

        let info = StreamInfo {
            // True channel count; a zero here leaves the session in its
            // failed state rather than erroring out of the engine.
            channels: params.channels.map(|c| c.count() as u16).unwrap_or(0),
            sample_rate,
            bits_per_sample: params.bits_per_sample.unwrap_or(16) as u8,
            total_frames: params.n_frames.unwrap_or(0),
            max_block_size: params
                .max_frames_per_packet
                .unwrap_or(0)
                .min(u16::MAX as u64) as u16,
        };

        let decoder = FlacDecoder::try_new(&params, &DecoderOptions::default()).map_err(|e| {
            DecodeError::InvalidFormat(format!("failed to create FLAC decoder: {e}"))
        })?;

        debug!(
            channels = info.channels,
            rate = info.sample_rate,
            bits = info.bits_per_sample,
            total_frames = info.total_frames,
            "FLAC engine attached"
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            info,
            state: EngineState::Ready,
            skip: 0,
            scratch: Vec::new(),
        })
    }

    /// Shift one decoded block to native depth and push it through the sink,
    /// dropping any leading frames still owed from the last seek.
    ///
    /// Returns `None` when the whole block precedes the seek target and
    /// nothing was written, otherwise the sink's verdict.
    fn forward_block(
        scratch: &mut Vec<Vec<i32>>,
        skip: &mut u64,
        bits_per_sample: u8,
        buf: &AudioBuffer<i32>,
        packet_ts: u64,
        sink: &mut dyn BlockSink,
    ) -> Option<bool> {
        let total = buf.frames();
        let trim = (*skip).min(total as u64) as usize;
        *skip -= trim as u64;
        if trim == total {
            return None;
        }

        let frames = total - trim;
        let start_frame = packet_ts + trim as u64;
        let channels = buf.spec().channels.count();
        let shift = 32u32.saturating_sub(bits_per_sample as u32);

        scratch.resize_with(channels, Vec::new);
        for (ch, plane) in scratch.iter_mut().enumerate() {
            plane.clear();
            plane.extend(buf.chan(ch)[trim..total].iter().map(|&s| s >> shift));
        }
        let planes: Vec<&[i32]> = scratch.iter().map(|p| p.as_slice()).collect();

        let block = DecodedBlock {
            channels: &planes,
            frames,
            start_frame,
        };
        Some(sink.write_block(&block))
    }
}

impl BlockEngine for FlacEngine {
    fn read_metadata(&mut self, sink: &mut dyn BlockSink) -> bool {
        // Header parsing happened at attach time; forward the result.
        sink.stream_info(&self.info);
        true
    }

    fn process_block(&mut self, sink: &mut dyn BlockSink) -> bool {
        if self.state != EngineState::Ready {
            return self.state == EngineState::EndOfStream;
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("end of stream reached");
                    self.state = EngineState::EndOfStream;
                    return true;
                }
                Err(e) => {
                    warn!("failed to read packet: {e}");
                    self.state = EngineState::Failed;
                    return false;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let packet_ts = packet.ts();
            match self.decoder.decode(&packet) {
                Ok(AudioBufferRef::S32(buf)) => {
                    match Self::forward_block(
                        &mut self.scratch,
                        &mut self.skip,
                        self.info.bits_per_sample,
                        &buf,
                        packet_ts,
                        sink,
                    ) {
                        Some(true) => return true,
                        Some(false) => {
                            self.state = EngineState::Failed;
                            return false;
                        }
                        // Entire block precedes the seek target; decode on.
                        None => continue,
                    }
                }
                Ok(_) => {
                    warn!("unexpected sample format from FLAC decoder");
                    self.state = EngineState::Failed;
                    return false;
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frame; the packet is consumed and decoding
                    // can continue from the next one.
                    sink.decode_error(e);
                    return true;
                }
                Err(e) => {
                    warn!("fatal decode failure: {e}");
                    self.state = EngineState::Failed;
                    return false;
                }
            }
        }
    }

    fn seek_frame(&mut self, frame: u64) -> bool {
        let target = SeekTo::TimeStamp {
            ts: frame,
            track_id: self.track_id,
        };
        match self.reader.seek(SeekMode::Accurate, target) {
            Ok(seeked) => {
                self.decoder.reset();
                // The reader resumes at the packet containing the target;
                // the frames before it are dropped during decode.
                self.skip = frame.saturating_sub(seeked.actual_ts);
                self.state = EngineState::Ready;
                true
            }
            Err(e) => {
                // The byte source position is now indeterminate, but the
                // engine condition is otherwise unchanged.
                warn!("seek to frame {frame} failed: {e}");
                false
            }
        }
    }

    fn state(&self) -> EngineState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IoSource;
    use std::io::Cursor;
    use symphonia::core::audio::{Channels, SignalSpec};

    /// Sink that records every block it receives, channels deep-copied.
    #[derive(Default)]
    struct RecordingSink {
        blocks: Vec<(u64, Vec<Vec<i32>>)>,
    }

    impl BlockSink for RecordingSink {
        fn stream_info(&mut self, _info: &StreamInfo) {}

        fn write_block(&mut self, block: &DecodedBlock<'_>) -> bool {
            self.blocks.push((
                block.start_frame,
                block.channels.iter().map(|c| c.to_vec()).collect(),
            ));
            true
        }

        fn decode_error(&mut self, _message: &str) {}
    }

    /// A mono 16-bit block of `frames` frames starting at sample value
    /// `base`, at symphonia's full 32-bit scale.
    fn mono_block(frames: usize, base: i32) -> AudioBuffer<i32> {
        let spec = SignalSpec::new(44100, Channels::FRONT_LEFT);
        let mut buf = AudioBuffer::<i32>::new(frames as u64, spec);
        buf.render_reserved(Some(frames));
        for (i, s) in buf.chan_mut(0).iter_mut().enumerate() {
            *s = (base + i as i32) << 16;
        }
        buf
    }

    #[test]
    fn first_block_after_a_seek_is_trimmed_to_the_target() {
        // Accurate seek to frame 1003 resumes at the packet whose ts is
        // 1000; the three frames before the target must not reach the sink.
        let buf = mono_block(8, 0);
        let mut scratch = Vec::new();
        let mut skip = 3u64;
        let mut sink = RecordingSink::default();

        let wrote =
            FlacEngine::forward_block(&mut scratch, &mut skip, 16, &buf, 1000, &mut sink);
        assert_eq!(wrote, Some(true));
        assert_eq!(skip, 0);

        let (start, channels) = &sink.blocks[0];
        assert_eq!(*start, 1003);
        assert_eq!(channels[0], vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn blocks_wholly_before_the_seek_target_are_dropped() {
        let buf = mono_block(8, 0);
        let mut scratch = Vec::new();
        let mut skip = 20u64;
        let mut sink = RecordingSink::default();

        let wrote =
            FlacEngine::forward_block(&mut scratch, &mut skip, 16, &buf, 0, &mut sink);
        assert_eq!(wrote, None);
        assert_eq!(skip, 12);
        assert!(sink.blocks.is_empty());

        // The next block covers the remaining distance and delivers only
        // the frames at and past the target.
        let next = mono_block(16, 8);
        let wrote =
            FlacEngine::forward_block(&mut scratch, &mut skip, 16, &next, 8, &mut sink);
        assert_eq!(wrote, Some(true));
        assert_eq!(skip, 0);
        assert_eq!(sink.blocks[0].0, 20);
        assert_eq!(sink.blocks[0].1[0], vec![20, 21, 22, 23]);
    }

    #[test]
    fn exact_seeks_leave_blocks_untouched() {
        let buf = mono_block(4, 100);
        let mut scratch = Vec::new();
        let mut skip = 0u64;
        let mut sink = RecordingSink::default();

        let wrote =
            FlacEngine::forward_block(&mut scratch, &mut skip, 16, &buf, 500, &mut sink);
        assert_eq!(wrote, Some(true));
        assert_eq!(sink.blocks[0].0, 500);
        assert_eq!(sink.blocks[0].1[0], vec![100, 101, 102, 103]);
    }

    #[test]
    fn garbage_bytes_are_rejected_at_attach() {
        let junk = IoSource::new(Cursor::new(vec![0xDEu8, 0xAD, 0xBE, 0xEF].repeat(64))).unwrap();
        let result = FlacEngine::new(Box::new(junk));
        assert!(matches!(result, Err(DecodeError::InvalidFormat(_))));
    }

    #[test]
    fn empty_source_is_rejected_at_attach() {
        let empty = IoSource::new(Cursor::new(Vec::new())).unwrap();
        assert!(FlacEngine::new(Box::new(empty)).is_err());
    }
}
