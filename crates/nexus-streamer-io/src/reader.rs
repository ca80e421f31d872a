//! Forward-only windowed reader over a chunked array.
//!
//! Replay sources ask for consecutive index ranges (one pulse worth of
//! events, one log sample) from arrays far too large to load at once. The
//! reader keeps exactly one chunk buffered and serves each range from it,
//! pulling further chunks only when a range runs past the buffer's end.
//!
//! ```text
//!            buffer_start          buffer_end
//!                 │◄──── buffered ────►│
//! ... consumed ...│xxxxxxxxxxxxxxxxxxxx│ ... not yet read ...
//!                      ▲         ▲
//!                    start      end       (served from the buffer)
//! ```
//!
//! Ranges must be requested in order: each `start` must be at or after the
//! previous `end`. A chunk dropped from the buffer is never read again.

use tracing::trace;

use crate::{ChunkedArray, IoError};

/// Windowed cursor over one [`ChunkedArray`].
#[derive(Debug)]
pub struct ChunkedSequentialReader<A: ChunkedArray> {
    array: A,
    buffer: Vec<A::Item>,
    /// Global index of `buffer[0]`.
    buffer_start: u64,
    /// End of the previous request.
    position: u64,
    exhausted: bool,
}

impl<A: ChunkedArray> ChunkedSequentialReader<A> {
    /// Wraps an array. No chunk is read until the first request needs one.
    pub fn new(array: A) -> Self {
        Self {
            array,
            buffer: Vec::new(),
            buffer_start: 0,
            position: 0,
            exhausted: false,
        }
    }

    /// Total number of elements in the underlying array.
    pub fn len(&self) -> u64 {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// End index of the previous request.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns true once the underlying array has run out of chunks.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The underlying array's `units` attribute.
    pub fn units(&self) -> Option<&str> {
        self.array.units()
    }

    /// Returns the elements in `[start, end)`.
    ///
    /// A result shorter than `end - start` means the array ended inside the
    /// requested range; callers treat it as "no more data".
    ///
    /// # Panics
    ///
    /// Panics if `start` is before the end of the previous request or if
    /// `end < start`. Both are caller bugs, never data conditions.
    pub fn fetch_range(&mut self, start: u64, end: u64) -> Result<Vec<A::Item>, IoError> {
        assert!(
            start >= self.position,
            "chunked reader is forward-only: requested start {start} is before previous end {}",
            self.position
        );
        assert!(end >= start, "invalid range {start}..{end}");
        self.position = end;

        let mut out = Vec::with_capacity(usize::try_from(end - start).unwrap_or(0).min(1 << 20));
        loop {
            let buffer_end = self.buffer_start + self.buffer.len() as u64;

            if start < buffer_end {
                let lo = (start.max(self.buffer_start) - self.buffer_start) as usize;
                let hi = (end.min(buffer_end) - self.buffer_start) as usize;
                out.extend_from_slice(&self.buffer[lo..hi]);
            }
            if end <= buffer_end || self.exhausted {
                return Ok(out);
            }

            match self.array.next_chunk()? {
                Some(chunk) => {
                    debug_assert_eq!(chunk.start, buffer_end, "chunks must be contiguous");
                    trace!(start = chunk.start, len = chunk.len(), "loaded chunk");
                    self.buffer_start = chunk.start;
                    self.buffer = chunk.data;
                }
                None => {
                    self.exhausted = true;
                    self.buffer_start = buffer_end;
                    self.buffer = Vec::new();
                }
            }
        }
    }

    /// Returns the element at `index`, or `None` past the end of the array.
    ///
    /// Same ordering rules as [`fetch_range`](Self::fetch_range).
    pub fn fetch_one(&mut self, index: u64) -> Result<Option<A::Item>, IoError> {
        Ok(self.fetch_range(index, index + 1)?.pop())
    }
}
