//! Chunked arrays.
//!
//! A [`ChunkedArray`] hands out the contents of one recorded array as a
//! sequence of contiguous chunks, in increasing index order, each exactly
//! once. Chunks are the atomic unit of I/O: a chunk is either fully
//! materialized or not read at all.

use std::fmt::Debug;
use std::ops::Range;

use nexus_streamer_types::Scalar;

use crate::IoError;

/// Element types an array can be read as.
///
/// Stored values are decoded to a [`Scalar`] and then converted, so any
/// stored dtype can be read as any element type.
pub trait Element: Copy + Debug + Send + 'static {
    fn from_scalar(value: Scalar) -> Self;
}

impl Element for Scalar {
    fn from_scalar(value: Scalar) -> Self {
        value
    }
}

impl Element for u32 {
    fn from_scalar(value: Scalar) -> Self {
        u32::try_from(value.as_u64()).unwrap_or(u32::MAX)
    }
}

impl Element for u64 {
    fn from_scalar(value: Scalar) -> Self {
        value.as_u64()
    }
}

impl Element for i64 {
    fn from_scalar(value: Scalar) -> Self {
        value.as_i64()
    }
}

impl Element for f64 {
    fn from_scalar(value: Scalar) -> Self {
        value.as_f64()
    }
}

/// One materialized chunk of an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    /// Global index of the first element.
    pub start: u64,
    pub data: Vec<T>,
}

impl<T> Chunk<T> {
    pub fn new(start: u64, data: Vec<T>) -> Self {
        Self { start, data }
    }

    /// One past the global index of the last element.
    pub fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Forward-only access to the chunks of one array.
pub trait ChunkedArray: Send {
    type Item: Element;

    /// Total number of elements.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The array's `units` attribute, if it has one.
    fn units(&self) -> Option<&str>;

    /// Returns the next chunk, or `None` once every chunk has been returned.
    fn next_chunk(&mut self) -> Result<Option<Chunk<Self::Item>>, IoError>;

    /// Reads the final element.
    ///
    /// The default drains the remaining chunks; stores with random access
    /// override it to read only the last chunk.
    fn read_last(&mut self) -> Result<Option<Self::Item>, IoError> {
        let mut last = None;
        while let Some(chunk) = self.next_chunk()? {
            if let Some(value) = chunk.data.last() {
                last = Some(*value);
            }
        }
        Ok(last)
    }

    /// Reads every remaining element. Only meant for small arrays.
    fn read_to_end(&mut self) -> Result<Vec<Self::Item>, IoError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            out.extend(chunk.data);
        }
        Ok(out)
    }
}

/// A type-erased chunked array.
pub type BoxedArray<T> = Box<dyn ChunkedArray<Item = T>>;

impl<A: ChunkedArray + ?Sized> ChunkedArray for Box<A> {
    type Item = A::Item;

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn units(&self) -> Option<&str> {
        (**self).units()
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<Self::Item>>, IoError> {
        (**self).next_chunk()
    }

    fn read_last(&mut self) -> Result<Option<Self::Item>, IoError> {
        (**self).read_last()
    }

    fn read_to_end(&mut self) -> Result<Vec<Self::Item>, IoError> {
        (**self).read_to_end()
    }
}

/// An in-memory array split into fixed-size chunks.
#[derive(Debug, Clone)]
pub struct MemoryArray<T> {
    data: Vec<T>,
    chunk_len: usize,
    cursor: usize,
    units: Option<String>,
}

impl<T: Element> MemoryArray<T> {
    /// Creates an array that yields chunks of `chunk_len` elements.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_len` is 0.
    pub fn new(data: Vec<T>, chunk_len: usize) -> Self {
        assert!(chunk_len > 0, "chunk length must be positive");
        Self {
            data,
            chunk_len,
            cursor: 0,
            units: None,
        }
    }

    /// Attaches a `units` attribute.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Number of chunks this array is split into.
    pub fn chunk_count(&self) -> usize {
        self.data.len().div_ceil(self.chunk_len)
    }
}

impl<T: Element> ChunkedArray for MemoryArray<T> {
    type Item = T;

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<T>>, IoError> {
        if self.cursor >= self.data.len() {
            return Ok(None);
        }
        let start = self.cursor;
        let end = (start + self.chunk_len).min(self.data.len());
        self.cursor = end;
        Ok(Some(Chunk::new(start as u64, self.data[start..end].to_vec())))
    }

    fn read_last(&mut self) -> Result<Option<T>, IoError> {
        Ok(self.data.last().copied())
    }
}
