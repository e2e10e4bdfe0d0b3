//! # retroarc Core
//!
//! Core components for the retroarc game-archive library.
//!
//! This crate provides the building blocks the archive engines and
//! filter codecs are assembled from:
//!
//! - [`stream`]: the seekable byte stream contract plus in-memory and
//!   file-backed implementations
//! - [`sub`]: a bounded, relocatable window over a parent stream
//! - [`segment`]: an edit-friendly stream supporting mid-sequence
//!   insert/remove with deferred commit
//! - [`bits`]: incremental bit-level packing for variable-width codes
//! - [`filter`]: the streaming codec contract and combinators
//! - [`filtered`]: the decode-on-read / encode-on-flush stream adapter
//! - [`entry`], [`archive`]: the uniform entry model and `Archive`
//!   trait
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! +----------------------------------------------------------+
//! | Format adapters + engines (retroarc-archive)             |
//! |     FAT engine, fixed engine, registry                   |
//! +----------------------------------------------------------+
//! | Codecs (retroarc-filters)                                |
//! |     RLE, LZW, LZSS, LZS, BPE, stream ciphers             |
//! +----------------------------------------------------------+
//! | This crate                                               |
//! |     Stream / SubStream / SegStream / FilteredStream      |
//! |     BitReader / BitWriter, Entry, Archive trait, Error   |
//! +----------------------------------------------------------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use retroarc_core::stream::{MemStream, ReadStream, SeekFrom, Stream, shared};
//! use retroarc_core::segment::SegStream;
//!
//! // Insert four bytes into the middle of a stream without shifting
//! // anything until commit.
//! let parent = shared(MemStream::from_vec(b"AAAABBBB".to_vec()));
//! let mut seg = SegStream::new(parent);
//! seg.insert(4, 4).unwrap();
//! seg.seek(SeekFrom::Start(4)).unwrap();
//! seg.write(b"CCCC").unwrap();
//! seg.commit().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod bits;
pub mod entry;
pub mod error;
pub mod filter;
pub mod filtered;
#[cfg(feature = "mmap")]
pub mod mmap;
pub mod segment;
pub mod stream;
pub mod sub;

// Re-exports for convenience
pub use archive::{Archive, Attribute, AttributeKind, AttributeValue};
pub use bits::{BitOrder, BitReader, BitWriter};
pub use entry::{Caps, Entry, EntryAttrs, FILETYPE_GENERIC, FileHandle, new_handle};
pub use error::{Error, Result};
pub use filter::{Filter, FilterChain, UnsupportedFilter, run_filter};
pub use filtered::{FilteredStream, SizeCallback};
pub use segment::{SegStream, stream_move};
pub use stream::{FileStream, MemStream, ReadStream, SeekFrom, SharedStream, Stream, shared};
pub use sub::SubStream;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::archive::{Archive, Attribute, AttributeValue};
    pub use crate::entry::{Caps, Entry, EntryAttrs, FILETYPE_GENERIC, FileHandle};
    pub use crate::error::{Error, Result};
    pub use crate::filter::Filter;
    pub use crate::stream::{
        MemStream, ReadStream, SeekFrom, SharedStream, Stream, shared,
    };
}
