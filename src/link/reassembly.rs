//! Multi-packet reassembly: the metadata blob and the image dump.
//!
//! ```text
//! Metadata:  [total|data…] [total|data…] … ──▶ 1 KiB accumulator ──▶ valid
//! Dump:      [offset|128 B] [offset|128 B] … ──▶ bounds check ──▶ ImageSink
//!                                          offset == size-1 ──▶ complete (no write)
//! ```
//!
//! Both are reset by the request that starts a cycle. Neither ever writes
//! past its bounds: an over-long metadata chunk fails the transfer and an
//! out-of-range dump chunk is rejected before it reaches the sink.

use heapless::Vec;
use serde::Deserialize;

use crate::error::TransferError;
use crate::protocol::types::{DumpChunk, MetadataChunk};

/// Metadata accumulator capacity.
pub const METADATA_CAPACITY: usize = 1024;

/// A completed metadata blob.
pub type MetadataBlob = Vec<u8, METADATA_CAPACITY>;

// ── Metadata ─────────────────────────────────────────────────

pub struct MetadataAccumulator {
    buf: [u8; METADATA_CAPACITY],
    index: usize,
    expected: usize,
    valid: bool,
}

impl MetadataAccumulator {
    pub const fn new() -> Self {
        Self {
            buf: [0; METADATA_CAPACITY],
            index: 0,
            expected: 0,
            valid: false,
        }
    }

    /// Start a new cycle.
    pub fn reset(&mut self) {
        self.index = 0;
        self.expected = 0;
        self.valid = false;
    }

    /// Drop the validity flag, keeping nothing of the partial blob.
    pub fn invalidate(&mut self) {
        self.reset();
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Bytes received so far in the current cycle.
    pub fn received(&self) -> usize {
        self.index
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Append one chunk. Returns `Ok(true)` when the blob is complete.
    ///
    /// Any error resets the accumulator.
    pub fn append(&mut self, chunk: &MetadataChunk) -> Result<bool, TransferError> {
        let total = chunk.total_size as usize;
        let result = self.append_inner(total, &chunk.data);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn append_inner(&mut self, total: usize, data: &[u8]) -> Result<bool, TransferError> {
        if total > METADATA_CAPACITY {
            return Err(TransferError::MetadataTooLarge(total));
        }
        if self.index == 0 {
            self.expected = total;
            self.valid = false;
        } else if total != self.expected {
            return Err(TransferError::MetadataSizeChanged {
                expected: self.expected,
                announced: total,
            });
        }

        let end = self.index + data.len();
        if end > self.expected {
            return Err(TransferError::MetadataOverflow {
                capacity: self.expected,
                attempted: end,
            });
        }
        self.buf[self.index..end].copy_from_slice(data);
        self.index = end;

        if self.index == self.expected {
            self.valid = true;
            self.index = 0;
            return Ok(true);
        }
        Ok(false)
    }

    /// The completed blob, if the last cycle finished.
    pub fn blob(&self) -> Option<&[u8]> {
        self.valid.then(|| &self.buf[..self.expected])
    }

    /// `image_size` from the completed blob's JSON, if present.
    pub fn image_size(&self) -> Option<u32> {
        parse_image_size(self.blob()?)
    }
}

impl Default for MetadataAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct MetadataFields {
    image_size: Option<u32>,
}

/// Look up `image_size` in a metadata JSON blob. Trailing NUL padding is
/// ignored; anything unparsable yields `None`.
pub fn parse_image_size(blob: &[u8]) -> Option<u32> {
    let end = blob.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    serde_json::from_slice::<MetadataFields>(&blob[..end])
        .ok()?
        .image_size
}

// ── Dump ─────────────────────────────────────────────────────

/// Where and how much of a dump chunk to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpWrite {
    pub address: u32,
    pub len: usize,
}

/// What to do with an accepted dump chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStep {
    /// Image data for the sink.
    Write(DumpWrite),
    /// The chunk at `size - 1`: the transfer is done, its data is not image.
    Complete,
}

/// State of one image dump cycle.
pub struct DumpTransfer {
    base: u32,
    size: u32,
    active: bool,
    complete: bool,
    written: u32,
}

impl DumpTransfer {
    pub const fn new(base: u32) -> Self {
        Self {
            base,
            size: 0,
            active: false,
            complete: false,
            written: 0,
        }
    }

    /// Start a cycle for an image of `size` bytes.
    pub fn start(&mut self, size: u32) {
        self.size = size;
        self.active = true;
        self.complete = false;
        self.written = 0;
    }

    pub fn abort(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn written(&self) -> u32 {
        self.written
    }

    /// Validate a chunk and work out the clipped write, or recognise the
    /// completion sentinel.
    pub fn accept(&self, chunk: &DumpChunk) -> Result<DumpStep, TransferError> {
        if !self.active {
            return Err(TransferError::DumpNotActive);
        }
        if chunk.offset >= self.size {
            return Err(TransferError::DumpOutOfBounds {
                address: self.base.wrapping_add(chunk.offset),
                base: self.base,
                size: self.size,
            });
        }
        if chunk.offset == self.size - 1 {
            return Ok(DumpStep::Complete);
        }
        let room = (self.size - chunk.offset) as usize;
        Ok(DumpStep::Write(DumpWrite {
            address: self.base + chunk.offset,
            len: chunk.data.len().min(room),
        }))
    }

    /// Record a completed write.
    pub fn record(&mut self, write: &DumpWrite) {
        self.written = self.written.saturating_add(write.len as u32);
    }

    /// Close the cycle. The expected size goes back to unknown until the
    /// next request.
    pub fn finish(&mut self) {
        self.complete = true;
        self.active = false;
        self.size = 0;
    }
}
