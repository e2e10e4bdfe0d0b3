//! Archive entry model.
//!
//! One [`Entry`] per archive member, shared between the engine, the
//! caller and any open streams as an [`FileHandle`]. The fields mirror
//! what a DOS game directory actually records: where the bytes sit,
//! how many are stored, how many they decode to, and a small bag of
//! per-format extras.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

/// Type tag for plain data entries.
pub const FILETYPE_GENERIC: &str = "";

bitflags! {
    /// Per-entry attribute bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryAttrs: u8 {
        /// Entry data is stored compressed.
        const COMPRESSED = 1 << 0;
        /// Entry data is stored encrypted.
        const ENCRYPTED = 1 << 1;
        /// Entry is a nested container, openable as an archive.
        const FOLDER = 1 << 2;
        /// Entry is hidden from normal listings.
        const HIDDEN = 1 << 3;
    }
}

/// A single archive member.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    /// Filename; empty for nameless formats. Compared
    /// case-insensitively unless the format says otherwise.
    pub name: String,
    /// Opaque type tag; [`FILETYPE_GENERIC`] for plain data.
    pub filetype: String,
    /// Bytes occupied in the backing stream (after any filter).
    pub stored_size: u64,
    /// Bytes after decoding the filter; equals `stored_size` for
    /// unfiltered entries.
    pub real_size: u64,
    /// Byte position of the entry's first byte in the backing stream.
    pub offset: u64,
    /// Bytes reserved ahead of the payload that belong to the
    /// directory, not the payload (inline FAT rows).
    pub header_len: u64,
    /// Attribute bits.
    pub attrs: EntryAttrs,
    /// Filter code to apply on open; empty for none.
    pub filter: String,
    /// True while the entry is a member of its archive.
    pub valid: bool,
    /// Position in the archive's entry vector; used by directory
    /// writers to locate FAT rows.
    pub index: usize,
    /// Format-specific bag (sub-archive selector, timestamp bytes).
    pub extra: Vec<u8>,
}

/// Shared handle to an entry. Stays dereferenceable after the entry
/// is removed so open streams can be checked for identity; `valid`
/// goes false at that point.
pub type FileHandle = Rc<RefCell<Entry>>;

/// Wrap a freshly parsed entry for sharing.
pub fn new_handle(entry: Entry) -> FileHandle {
    Rc::new(RefCell::new(entry))
}

/// What a format supports, declared by its adapter. The engine
/// refuses operations outside these limits before touching any state.
#[derive(Debug, Clone, Copy)]
pub struct Caps {
    /// Entries carry filenames.
    pub filenames: bool,
    /// Longest permitted filename, when `filenames` is set.
    pub max_name_len: usize,
    /// Entries may be folders openable as nested archives.
    pub folders: bool,
    /// Filenames compare case-sensitively.
    pub case_sensitive: bool,
    /// Entries can be inserted, removed, resized and renamed.
    pub writable: bool,
    /// The number of entries is fixed by the format.
    pub fixed_count: bool,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            filenames: true,
            max_name_len: 12,
            folders: false,
            case_sensitive: false,
            writable: true,
            fixed_count: false,
        }
    }
}
