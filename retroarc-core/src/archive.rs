//! The uniform archive abstraction.
//!
//! Every container format - FAT-directory files, inline-header packs,
//! assets embedded in an executable - presents the same [`Archive`]
//! interface, so extraction and modding tools treat them all alike.

use crate::entry::{Caps, EntryAttrs, FileHandle};
use crate::error::{Error, Result};
use crate::stream::Stream;

/// The declared type of a format attribute.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    /// An integer within an inclusive range.
    Int {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// One of a fixed set of labelled values; stored as the label's
    /// position.
    Enum {
        /// Value labels, in encoding order.
        labels: &'static [&'static str],
    },
    /// Free-form text with a length cap.
    Text {
        /// Maximum character count.
        max_len: usize,
    },
}

/// Current value of a format attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Integer value.
    Int(i64),
    /// Index into the enumeration's labels.
    Enum(usize),
    /// Text value.
    Text(String),
}

/// A format-level attribute (version word, embedded description),
/// exposed as a flat list per archive.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Short identifier.
    pub name: &'static str,
    /// Declared type and bounds.
    pub kind: AttributeKind,
    /// Current value.
    pub value: AttributeValue,
}

/// An ordered collection of entries over a single backing stream.
///
/// Mutations are collected in memory and materialised by [`flush`];
/// dropping an archive without flushing abandons pending edits and
/// leaves the backing stream untouched.
///
/// [`flush`]: Archive::flush
pub trait Archive {
    /// The format's declared capabilities.
    fn caps(&self) -> Caps;

    /// Live view of current entries in stored order.
    fn files(&self) -> Vec<FileHandle>;

    /// Whether `handle` is still a member of this archive.
    fn is_valid(&self, handle: &FileHandle) -> bool;

    /// Case-insensitive lookup by name (case-sensitive if the format
    /// declares so).
    fn find(&self, name: &str) -> Option<FileHandle> {
        let case_sensitive = self.caps().case_sensitive;
        self.files().into_iter().find(|h| {
            let e = h.borrow();
            if case_sensitive {
                e.name == name
            } else {
                e.name.eq_ignore_ascii_case(name)
            }
        })
    }

    /// Open an entry's data. With `apply_filter`, and when the entry
    /// carries a filter code, the returned stream decodes on read and
    /// encodes on flush; otherwise it exposes the stored bytes.
    fn open(&mut self, handle: &FileHandle, apply_filter: bool) -> Result<Box<dyn Stream>>;

    /// Open a folder entry as a nested archive.
    fn open_folder(&mut self, _handle: &FileHandle) -> Result<Box<dyn Archive>> {
        Err(Error::invalid_operation(
            "this archive format has no folders",
        ))
    }

    /// Create a new entry before `before` (append when `None`),
    /// reserving `stored_size` bytes. The caller writes the payload
    /// through [`open`](Archive::open) afterwards.
    fn insert(
        &mut self,
        before: Option<&FileHandle>,
        name: &str,
        stored_size: u64,
        filetype: &str,
        attrs: EntryAttrs,
    ) -> Result<FileHandle>;

    /// Delete an entry and reclaim its space. Open streams on the
    /// entry become invalid.
    fn remove(&mut self, handle: &FileHandle) -> Result<()>;

    /// Rename an entry. Pure metadata; no payload bytes move.
    fn rename(&mut self, handle: &FileHandle, new_name: &str) -> Result<()>;

    /// Reorder an entry to sit before `before` (or last when `None`)
    /// without altering its bytes as seen through `open`.
    fn move_file(&mut self, handle: &FileHandle, before: Option<&FileHandle>) -> Result<()>;

    /// Grow or shrink the entry's slot to `new_stored` bytes and
    /// record `new_real` as its decoded size. May shift subsequent
    /// entries.
    fn resize(&mut self, handle: &FileHandle, new_stored: u64, new_real: u64) -> Result<()>;

    /// Materialise all pending changes to the backing stream.
    fn flush(&mut self) -> Result<()>;

    /// The format's declared attributes with their current values.
    fn attributes(&self) -> Vec<Attribute> {
        Vec::new()
    }

    /// Update one attribute. The engine keeps the directory correct
    /// across any header resize this causes.
    fn set_attribute(&mut self, _index: usize, _value: AttributeValue) -> Result<()> {
        Err(Error::invalid_operation(
            "this archive format has no attributes",
        ))
    }
}
