//! # Byte Source Adapters
//!
//! Bridges between the crate's [`ByteSource`] contract and the outside
//! world: [`IoSource`] lifts any std `Read + Seek` (files, memory cursors)
//! into a `ByteSource`, and [`SourceReader`] presents a boxed `ByteSource`
//! to the decoding engine as a symphonia `MediaSource`.

use crate::error::Result;
use crate::traits::ByteSource;
use std::io::{self, Read, Seek, SeekFrom};
use symphonia::core::io::MediaSource;
use tracing::warn;

// ============================================================================
// IoSource: std Read + Seek → ByteSource
// ============================================================================

/// [`ByteSource`] implementation over any std `Read + Seek` value.
///
/// The total size is measured once at construction; position and
/// end-of-stream are tracked locally so the `pos`/`size`/`eos` queries stay
/// infallible, as the contract requires.
pub struct IoSource<T> {
    inner: T,
    pos: u64,
    size: u64,
}

impl<T: Read + Seek + Send + Sync> IoSource<T> {
    /// Wrap `inner`, measuring its total size.
    ///
    /// # Errors
    ///
    /// [`DecodeError::IoError`](crate::DecodeError::IoError) if the size
    /// probe fails.
    pub fn new(mut inner: T) -> Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            pos: 0,
            size,
        })
    }
}

impl<T: Read + Seek + Send + Sync> ByteSource for IoSource<T> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        loop {
            match self.inner.read(buf) {
                Ok(n) => {
                    self.pos += n as u64;
                    return n;
                }
                // An interrupted read has transferred nothing; retry it
                // rather than report a spurious zero-byte result.
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("byte source read failed at offset {}: {}", self.pos, e);
                    return 0;
                }
            }
        }
    }

    fn seek(&mut self, offset: u64) -> bool {
        match self.inner.seek(SeekFrom::Start(offset)) {
            Ok(reached) => {
                self.pos = reached;
                reached == offset
            }
            Err(e) => {
                warn!("byte source seek to {} failed: {}", offset, e);
                false
            }
        }
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn eos(&self) -> bool {
        self.pos >= self.size
    }
}

// ============================================================================
// SourceReader: ByteSource → symphonia MediaSource
// ============================================================================

/// Adapter presenting a [`ByteSource`] to the engine as a `MediaSource`.
///
/// Enforces the contract's hard-error rule: a read that yields zero bytes
/// while the source does not report end-of-stream aborts decoding instead
/// of being treated as "no data yet".
pub(crate) struct SourceReader {
    source: Box<dyn ByteSource>,
}

impl SourceReader {
    pub(crate) fn new(source: Box<dyn ByteSource>) -> Self {
        Self { source }
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.source.read(buf);
        if n == 0 && !self.source.eos() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "byte source returned no data before end of stream",
            ));
        }
        Ok(n)
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => self.source.size() as i128 + delta as i128,
            SeekFrom::Current(delta) => self.source.pos() as i128 + delta as i128,
        };
        let target = u64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        if !self.source.seek(target) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("byte source rejected seek to {target}"),
            ));
        }
        Ok(target)
    }
}

impl MediaSource for SourceReader {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.source.size())
    }
}
