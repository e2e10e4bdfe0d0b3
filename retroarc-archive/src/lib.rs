//! # retroarc Archive
//!
//! Archive engines and format adapters for the retroarc game-archive
//! library.
//!
//! This crate provides the two archive engines and the catalogue of
//! concrete DOS game formats built on them:
//!
//! - [`fat`]: the generic mutable FAT engine - insert, remove,
//!   resize, rename and reorder entries over a segmented stream while
//!   every directory row and open sub-stream stays consistent
//! - [`fixed`]: the fixed-slot engine for assets embedded in a game
//!   executable
//! - [`fmt`]: one adapter per supported container
//! - [`registry`]: format enumeration and auto-detection
//!
//! ## Example
//!
//! ```rust
//! use retroarc_archive::registry::{ArchiveFormat, SuppData, format_by_code};
//! use retroarc_core::prelude::*;
//! use retroarc_core::stream::shared;
//!
//! // Build a Wacky Wheels archive from scratch and add one file.
//! let format = format_by_code("dat-wacky").unwrap();
//! let content = shared(MemStream::new());
//! let mut supp = SuppData::new();
//! let mut archive = format.create(content, &mut supp).unwrap();
//!
//! let handle = archive
//!     .insert(None, "HELLO.DAT", 5, FILETYPE_GENERIC, EntryAttrs::default())
//!     .unwrap();
//! let mut file = archive.open(&handle, true).unwrap();
//! file.write(b"hello").unwrap();
//! file.flush().unwrap();
//! archive.flush().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod fat;
pub mod fixed;
pub mod fmt;
pub mod registry;

// Re-exports for convenience
pub use fat::{DirShift, FatArchive, FatLayout, SharedSeg};
pub use fixed::{FixedArchive, FixedFile, FixedResize};
pub use registry::{
    ArchiveFormat, Certainty, SuppData, SuppItem, all_formats, detect, format_by_code,
};
