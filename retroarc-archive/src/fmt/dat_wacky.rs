//! Wacky Wheels .DAT format.
//!
//! Layout: u16le file count, then one 22-byte row per file (14-byte
//! null-padded name, u32le size, u32le offset counted from the end of
//! the file-count word), then the payloads. Filenames are stored
//! uppercase. Documented on the ModdingWiki as "DAT Format (Wacky
//! Wheels)".

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry, FILETYPE_GENERIC};
use retroarc_core::error::{Error, Result};
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};

use crate::fat::{DirShift, FatArchive, FatLayout};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const FILECOUNT_OFFSET: u64 = 0;
const MAX_FILENAME_LEN: usize = 12;
const FILENAME_FIELD_LEN: usize = 14;
const FAT_ENTRY_LEN: u64 = 22;
const FAT_OFFSET: u64 = 2;
const FIRST_FILE_OFFSET: u64 = FAT_OFFSET;

fn row_pos(index: usize) -> u64 {
    FAT_OFFSET + index as u64 * FAT_ENTRY_LEN
}

struct DatWackyLayout;

impl FatLayout for DatWackyLayout {
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        new_entry.header_len = 0;
        // The new row itself pushes every payload along.
        new_entry.offset += FAT_ENTRY_LEN;
        new_entry.name = new_entry.name.to_uppercase();

        io.insert(row_pos(new_entry.index), FAT_ENTRY_LEN)?;
        io.seek(SeekFrom::Start(row_pos(new_entry.index)))?;
        io.write_name(&new_entry.name, FILENAME_FIELD_LEN)?;
        io.write_u32_le(new_entry.stored_size as u32)?;
        io.write_u32_le((new_entry.offset - FAT_OFFSET) as u32)?;

        Ok(Some(DirShift {
            at: FAT_OFFSET + count as u64 * FAT_ENTRY_LEN,
            delta: FAT_ENTRY_LEN as i64,
        }))
    }

    fn post_insert(&mut self, io: &mut SegStream, count: usize) -> Result<()> {
        io.seek(SeekFrom::Start(FILECOUNT_OFFSET))?;
        io.write_u16_le(count as u16)
    }

    fn pre_remove(
        &mut self,
        _io: &mut SegStream,
        count: usize,
        _entry: &Entry,
    ) -> Result<Option<DirShift>> {
        Ok(Some(DirShift {
            at: FAT_OFFSET + count as u64 * FAT_ENTRY_LEN,
            delta: -(FAT_ENTRY_LEN as i64),
        }))
    }

    fn remove_dir_entry(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.remove(row_pos(entry.index), FAT_ENTRY_LEN)
    }

    fn post_remove(&mut self, io: &mut SegStream, count: usize) -> Result<()> {
        io.seek(SeekFrom::Start(FILECOUNT_OFFSET))?;
        io.write_u16_le(count as u16)
    }

    fn update_name(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(row_pos(entry.index)))?;
        io.write_name(&entry.name, FILENAME_FIELD_LEN)
    }

    fn update_offset(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(row_pos(entry.index) + FILENAME_FIELD_LEN as u64 + 4))?;
        io.write_u32_le((entry.offset - FAT_OFFSET) as u32)
    }

    fn update_size(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(row_pos(entry.index) + FILENAME_FIELD_LEN as u64))?;
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
    if c.len() < FAT_OFFSET {
        return Err(Error::invalid_format("archive too short - no file count"));
    }
    c.seek(SeekFrom::Start(0))?;
    let num_files = c.read_u16_le()? as usize;

    let mut entries = Vec::with_capacity(num_files);
    for _ in 0..num_files {
        let name = c.read_name(FILENAME_FIELD_LEN)?;
        let stored_size = c.read_u32_le()? as u64;
        let offset = c.read_u32_le()? as u64 + FAT_OFFSET;
        entries.push(Entry {
            name,
            filetype: FILETYPE_GENERIC.to_string(),
            stored_size,
            real_size: stored_size,
            offset,
            ..Entry::default()
        });
    }
    Ok(entries)
}

/// The Wacky Wheels .DAT adapter.
pub struct DatWackyFormat;

impl ArchiveFormat for DatWackyFormat {
    fn code(&self) -> &'static str {
        "dat-wacky"
    }

    fn friendly_name(&self) -> &'static str {
        "Wacky Wheels DAT File"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dat"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Wacky Wheels"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        let len = content.len();
        if len < FAT_OFFSET {
            return Ok(Certainty::DefinitelyNo);
        }
        content.seek(SeekFrom::Start(0))?;
        let num_files = content.read_u16_le()? as u64;

        // An archive with no files had better be tiny.
        if num_files == 0 && len > FAT_OFFSET {
            return Ok(Certainty::DefinitelyNo);
        }
        let len_fat = num_files * FAT_ENTRY_LEN;
        if len_fat + FAT_OFFSET > len {
            return Ok(Certainty::DefinitelyNo);
        }

        for _ in 0..num_files {
            let mut field = [0u8; FILENAME_FIELD_LEN];
            content.read_exact(&mut field)?;
            for &b in &field {
                if b == 0 {
                    break;
                }
                if b < 32 {
                    return Ok(Certainty::DefinitelyNo);
                }
            }
            let len_entry = content.read_u32_le()? as u64;
            let off_entry = content.read_u32_le()? as u64 + FAT_OFFSET;
            if off_entry + len_entry > len {
                return Ok(Certainty::DefinitelyNo);
            }
        }
        Ok(Certainty::DefinitelyYes)
    }

    fn open(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let entries = parse(&content)?;
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(DatWackyLayout),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        {
            let mut c = content.borrow_mut();
            c.seek(SeekFrom::Start(0))?;
            c.write_u16_le(0)?;
        }
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(DatWackyLayout),
            FIRST_FILE_OFFSET,
            caps(),
            Vec::new(),
        )))
    }
}
