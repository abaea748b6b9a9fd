//! # FLAC Sample Source
//!
//! A pull-based, seekable FLAC decoder front-end that produces fixed-format
//! PCM (16-bit signed, interleaved, at most two channels) for a realtime
//! mixing pipeline.
//!
//! ## Overview
//!
//! The crate is built around three pieces:
//!
//! 1. **Decode session** ([`FlacStream`]): owns the decoding engine, stream
//!    metadata, the seek/end-of-stream bookkeeping, and a bounded overflow
//!    cache for samples the caller did not consume yet.
//! 2. **Pull/push adapter**: the engine pushes whole decoded blocks through
//!    a write callback; the session inverts that into the mixer's pull-based
//!    [`SampleStream::read_buffer`] call.
//! 3. **Sample conversion**: native FLAC sample widths (4 to 32 bits, planar)
//!    are converted to interleaved 16-bit output, with specialized fast
//!    paths for the common mono/stereo 8/16-bit shapes.
//!
//! ```text
//! ByteSource → BlockEngine (FLAC) → write callback → [caller buffer | cache]
//!                    ↑                                        ↓
//!                    └────────── read_buffer / seek ──── SampleStream
//! ```
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use flac_source::{open_flac_stream, IoSource, SampleStream};
//!
//! let file = std::fs::File::open("/music/track.flac").unwrap();
//! let mut stream = open_flac_stream(Box::new(IoSource::new(file).unwrap()))
//!     .expect("not a decodable FLAC stream");
//!
//! println!("{} Hz, stereo: {}", stream.rate(), stream.is_stereo());
//!
//! let mut pcm = vec![0i16; 4096];
//! while !stream.end_of_data() {
//!     let produced = stream.read_buffer(&mut pcm).unwrap();
//!     // feed &pcm[..produced] to the mixer
//! }
//! ```
//!
//! ## Threading Model
//!
//! The whole pipeline is synchronous and single-threaded: `read_buffer` and
//! `seek` drive the engine on the caller's thread, and the engine invokes the
//! write callback on that same thread before returning. `&mut self` on the
//! [`SampleStream`] surface makes reentrant or concurrent use of one session
//! unrepresentable; the caller (typically an audio-render thread) serializes
//! access by construction.

pub mod decoder;
pub mod engine;
pub mod error;
pub mod source;
pub mod traits;

pub use decoder::{open_flac_stream, FlacStream};
pub use engine::{BlockEngine, BlockSink, DecodedBlock, EngineState, StreamInfo};
pub use error::{DecodeError, Result};
pub use source::IoSource;
pub use traits::{ByteSource, SampleStream};
