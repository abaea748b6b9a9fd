//! # Decode Session Module
//!
//! The pull side of the crate: [`FlacStream`] owns one decoding engine and
//! turns its push-style block output into the mixer's pull-based
//! [`read_buffer`](crate::SampleStream::read_buffer) call.
//!
//! ## Architecture
//!
//! ```text
//! read_buffer(out)
//!   ├── drain overflow cache into out
//!   └── while more wanted and engine Ready:
//!         process_block ──► write callback
//!                             ├── clip at the known last frame
//!                             ├── convert into out (up to what is wanted)
//!                             └── convert the rest into the overflow cache
//! ```
//!
//! The write callback runs synchronously inside `process_block`, on the same
//! thread, while `read_buffer` is on the stack; the session models that
//! inversion with an explicit per-call sink object instead of captured
//! closures, keeping the reentrant contract visible and testable.

mod flac;
mod sample_converter;

pub use flac::{open_flac_stream, FlacStream};

pub(crate) use sample_converter::{ConvertMethod, PlanarCursor};

/// Output is clamped to stereo; source channels beyond the second are
/// dropped during conversion.
pub const MAX_OUTPUT_CHANNELS: usize = 2;
