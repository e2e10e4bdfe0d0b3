//! Descent .HOG format.
//!
//! Layout: a three-byte "DHF" signature, then each file as an inline
//! 17-byte header (13-byte null-terminated name, u32le size)
//! immediately followed by its payload. No central directory and no
//! stored offsets. Descent itself refuses archives with more than 250
//! files.

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry, FILETYPE_GENERIC};
use retroarc_core::error::{Error, Result};
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};

use crate::fat::{DirShift, FatArchive, FatLayout};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const HEADER_LEN: u64 = 3;
const MAX_FILENAME_LEN: usize = 12;
const FILENAME_FIELD_LEN: usize = 13;
const FAT_ENTRY_LEN: u64 = 17;
const FIRST_FILE_OFFSET: u64 = HEADER_LEN;

/// Maximum value supported by Descent.
const MAX_FILECOUNT: usize = 250;
/// Maximum value we will load.
const SAFETY_MAX_FILECOUNT: usize = 1024;

struct HogDescentLayout;

impl FatLayout for HogDescentLayout {
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        if count + 1 > MAX_FILECOUNT {
            return Err(Error::invalid_operation(format!(
                "too many files, the maximum is {}",
                MAX_FILECOUNT
            )));
        }
        new_entry.header_len = FAT_ENTRY_LEN;

        io.insert(new_entry.offset, FAT_ENTRY_LEN)?;
        io.seek(SeekFrom::Start(new_entry.offset))?;
        io.write_name(&new_entry.name, FILENAME_FIELD_LEN)?;
        io.write_u32_le(new_entry.stored_size as u32)?;

        // The inline header lands where the following entries used to
        // start.
        Ok(Some(DirShift {
            at: new_entry.offset,
            delta: FAT_ENTRY_LEN as i64,
        }))
    }

    fn update_name(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(entry.offset))?;
        io.write_name(&entry.name, FILENAME_FIELD_LEN)
    }

    // No stored offsets to update; headers travel with their
    // payloads.

    fn update_size(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(entry.offset + FILENAME_FIELD_LEN as u64))?;
        io.write_u32_le(entry.stored_size as u32)
    }
}

fn caps() -> Caps {
    Caps {
        filenames: true,
        max_name_len: MAX_FILENAME_LEN,
        folders: false,
        case_sensitive: false,
        writable: true,
        fixed_count: false,
    }
}

fn parse(content: &SharedStream) -> Result<Vec<Entry>> {
    let mut c = content.borrow_mut();
    let len = c.len();
    c.seek(SeekFrom::Start(FIRST_FILE_OFFSET))?;

    let mut entries = Vec::new();
    let mut off_next = FIRST_FILE_OFFSET;
    while off_next + FAT_ENTRY_LEN <= len {
        let name = c.read_name(FILENAME_FIELD_LEN)?;
        let stored_size = c.read_u32_le()? as u64;
        entries.push(Entry {
            name,
            filetype: FILETYPE_GENERIC.to_string(),
            stored_size,
            real_size: stored_size,
            offset: off_next,
            header_len: FAT_ENTRY_LEN,
            ..Entry::default()
        });

        off_next += FAT_ENTRY_LEN + stored_size;
        if off_next > len {
            // Truncated archive; expose what parsed cleanly.
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

/// The Descent .HOG adapter.
pub struct HogDescentFormat;

impl ArchiveFormat for HogDescentFormat {
    fn code(&self) -> &'static str {
        "hog-descent"
    }

    fn friendly_name(&self) -> &'static str {
        "Descent HOG file"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hog"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Descent"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        if content.len() < HEADER_LEN {
            return Ok(Certainty::DefinitelyNo);
        }
        let mut sig = [0u8; HEADER_LEN as usize];
        content.seek(SeekFrom::Start(0))?;
        content.read_exact(&mut sig)?;
        if &sig == b"DHF" {
            Ok(Certainty::DefinitelyYes)
        } else {
            Ok(Certainty::DefinitelyNo)
        }
    }

    fn open(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let entries = parse(&content)?;
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(HogDescentLayout),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        {
            let mut c = content.borrow_mut();
            c.seek(SeekFrom::Start(0))?;
            c.write(b"DHF")?;
        }
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(HogDescentLayout),
            FIRST_FILE_OFFSET,
            caps(),
            Vec::new(),
        )))
    }
}
