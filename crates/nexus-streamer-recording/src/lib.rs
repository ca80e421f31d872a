//! # nexus-streamer-recording: chunked recordings on disk
//!
//! A recording is a directory holding a JSON manifest and one chunk file
//! per recorded array:
//!
//! ```text
//! run_0042/
//! ├── manifest.json        groups, fields, dtypes, chunk tables
//! └── arrays/
//!     ├── 0000.chunks      chunk | chunk | chunk ...
//!     └── 0001.chunks
//! ```
//!
//! Chunks are compressed independently ([`CodecRegistry`]) so a
//! [`RecordedArray`] can read exactly one chunk per request through the
//! [`IoBackend`](nexus_streamer_io::IoBackend). Groups implement
//! [`ArrayGroup`](nexus_streamer_io::ArrayGroup), which is all the replay
//! sources need.

mod codec;
mod error;
pub mod manifest;
mod recording;
mod writer;

pub use codec::{Codec, CodecRegistry, Lz4Codec, RawCodec, ZstdCodec};
pub use error::RecordingError;
pub use manifest::{ChunkMeta, FieldMeta, GroupMeta, Manifest, parse_start_time};
pub use recording::{RecordedArray, RecordedGroup, Recording};
pub use writer::{FieldSpec, RecordingWriter};
