//! # nexus-streamer-io: Chunked array access for the NeXus streamer
//!
//! This crate provides the boundary between replay sources and the store
//! that holds recorded arrays:
//!
//! - **[`ChunkedArray`]**: a forward-only iterator over the chunks of one
//!   recorded array, each chunk materialized exactly once
//! - **[`ArrayGroup`]**: a named group of arrays (one `NXlog` or
//!   `NXevent_data` group of a recording)
//! - **[`ChunkedSequentialReader`]**: a windowed cursor that serves
//!   monotonically increasing index ranges from a chunked array without
//!   loading the whole array
//! - **[`IoBackend`]**: positional file I/O used by on-disk stores
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │    nexus-streamer-source     │
//! │ (ChunkedSequentialReader per │
//! │        array field)          │
//! └──────────────┬───────────────┘
//!                │ ChunkedArray / ArrayGroup
//! ┌──────────────┴───────────────┐
//! │      nexus-streamer-io       │
//! │  ┌──────────┐  ┌───────────┐ │
//! │  │  Memory  │  │ Recording │ │
//! │  │  arrays  │  │  (IoBack- │ │
//! │  │          │  │   end)    │ │
//! │  └──────────┘  └───────────┘ │
//! └──────────────────────────────┘
//! ```

mod array;
mod backend;
mod error;
mod group;
mod reader;
mod sync_backend;

pub use array::{BoxedArray, Chunk, ChunkedArray, Element, MemoryArray};
pub use backend::{FileHandle, IoBackend, OpenFlags};
pub use error::IoError;
pub use group::{ArrayGroup, MemoryGroup};
pub use reader::ChunkedSequentialReader;
pub use sync_backend::SyncBackend;

#[cfg(test)]
mod tests;
