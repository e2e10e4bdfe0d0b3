//! Stellar 7 .RES format.
//!
//! Layout: each entry is an inline 8-byte header (4-byte null-padded
//! name, u32le size) followed by its payload; the top bit of the size
//! marks the entry as a folder whose payload is itself a .RES
//! archive. Nested containers are opened through `open_folder`, not
//! modelled as a tree.

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry, EntryAttrs, FILETYPE_GENERIC};
use retroarc_core::error::{Error, Result};
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};

use crate::fat::{DirShift, FatArchive, FatLayout};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const FIRST_FILE_OFFSET: u64 = 0;
const MAX_FILENAME_LEN: usize = 4;
const FAT_FILESIZE_OFFSET: u64 = 4;
const FAT_ENTRY_LEN: u64 = 8;
const FOLDER_BIT: u32 = 0x8000_0000;

/// Don't read more than this many files.
const SAFETY_MAX_FILECOUNT: usize = 8192;

struct ResStellar7Layout;

impl FatLayout for ResStellar7Layout {
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        _count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        new_entry.header_len = FAT_ENTRY_LEN;
        new_entry.name = new_entry.name.to_uppercase();

        io.insert(new_entry.offset, FAT_ENTRY_LEN)?;
        io.seek(SeekFrom::Start(new_entry.offset))?;
        io.write_name(&new_entry.name, MAX_FILENAME_LEN)?;
        let mut size = new_entry.stored_size as u32;
        if new_entry.attrs.contains(EntryAttrs::FOLDER) {
            size |= FOLDER_BIT;
        }
        io.write_u32_le(size)?;

        Ok(Some(DirShift {
            at: new_entry.offset,
            delta: FAT_ENTRY_LEN as i64,
        }))
    }

    fn update_name(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(entry.offset))?;
        io.write_name(&entry.name, MAX_FILENAME_LEN)
    }

    fn update_size(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(entry.offset + FAT_FILESIZE_OFFSET))?;
        let mut size = entry.stored_size as u32;
        if entry.attrs.contains(EntryAttrs::FOLDER) {
            size |= FOLDER_BIT;
        }
        io.write_u32_le(size)
    }

    fn open_folder(&self, contents: SharedStream) -> Result<Box<dyn Archive>> {
        // A folder's payload is just another .RES archive.
        let entries = parse(&contents)?;
        let io = SegStream::new_shared(contents);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(ResStellar7Layout),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }
}

fn caps() -> Caps {
    Caps {
        filenames: true,
        max_name_len: MAX_FILENAME_LEN,
        folders: true,
        case_sensitive: false,
        writable: true,
        fixed_count: false,
    }
}

fn parse(content: &SharedStream) -> Result<Vec<Entry>> {
    let mut c = content.borrow_mut();
    let len = c.len();
    c.seek(SeekFrom::Start(0))?;

    let mut entries = Vec::new();
    let mut off_next = 0u64;
    while off_next + FAT_ENTRY_LEN <= len {
        let name = c.read_name(MAX_FILENAME_LEN)?;
        let size_field = c.read_u32_le()?;
        let stored_size = (size_field & !FOLDER_BIT) as u64;
        let mut attrs = EntryAttrs::default();
        if size_field & FOLDER_BIT != 0 {
            attrs |= EntryAttrs::FOLDER;
        }
        entries.push(Entry {
            name,
            filetype: FILETYPE_GENERIC.to_string(),
            stored_size,
            real_size: stored_size,
            offset: off_next,
            header_len: FAT_ENTRY_LEN,
            attrs,
            ..Entry::default()
        });

        off_next += FAT_ENTRY_LEN + stored_size;
        if off_next > len {
            entries.pop();
            break;
        }
        c.seek(SeekFrom::Current(stored_size as i64))?;
        if entries.len() >= SAFETY_MAX_FILECOUNT {
            return Err(Error::invalid_format("too many files or corrupted archive"));
        }
    }
    Ok(entries)
}

/// The Stellar 7 .RES adapter.
pub struct ResStellar7Format;

impl ArchiveFormat for ResStellar7Format {
    fn code(&self) -> &'static str {
        "res-stellar7"
    }

    fn friendly_name(&self) -> &'static str {
        "Stellar 7 Resource File"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["res"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Stellar 7"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        let len = content.len();
        content.seek(SeekFrom::Start(0))?;

        let mut off_next = 0u64;
        let mut count = 0usize;
        while count < SAFETY_MAX_FILECOUNT && off_next + FAT_ENTRY_LEN <= len {
            let mut name = [0u8; MAX_FILENAME_LEN];
            content.read_exact(&mut name)?;
            for &b in &name {
                if b == 0 {
                    break;
                }
                if b < 32 {
                    return Ok(Certainty::DefinitelyNo);
                }
            }
            let size = (content.read_u32_le()? & !FOLDER_BIT) as u64;
            off_next += FAT_ENTRY_LEN + size;
            if off_next > len {
                return Ok(Certainty::DefinitelyNo);
            }
            content.seek(SeekFrom::Current(size as i64))?;
            count += 1;
        }
        if count == SAFETY_MAX_FILECOUNT {
            return Ok(Certainty::PossiblyYes);
        }
        Ok(Certainty::DefinitelyYes)
    }

    fn open(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let entries = parse(&content)?;
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(ResStellar7Layout),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, content: SharedStream, supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        // No header; an empty stream is an empty archive.
        self.open(content, supp)
    }
}
