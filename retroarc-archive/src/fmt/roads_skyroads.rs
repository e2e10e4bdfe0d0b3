//! SkyRoads roads.lzs format.
//!
//! Layout: a FAT of (u16le offset, u16le decompressed size) pairs
//! with no count field - the first offset doubles as the FAT length -
//! then the LZS-compressed road payloads. Nameless; stored sizes are
//! inferred from the gap to the next offset, so this is the one stock
//! format where real size and stored size routinely differ.

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry};
use retroarc_core::error::Result;
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};

use crate::fat::{DirShift, FatArchive, FatLayout};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const FAT_ENTRY_LEN: u64 = 4;
const FIRST_FILE_OFFSET: u64 = 0;

fn row_pos(index: usize) -> u64 {
    index as u64 * FAT_ENTRY_LEN
}

struct RoadsSkyRoadsLayout;

impl FatLayout for RoadsSkyRoadsLayout {
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        new_entry.header_len = 0;
        new_entry.offset += FAT_ENTRY_LEN;
        new_entry.filter = "lzs-skyroads".to_string();
        new_entry.filetype = "map/skyroads".to_string();

        io.insert(row_pos(new_entry.index), FAT_ENTRY_LEN)?;
        io.seek(SeekFrom::Start(row_pos(new_entry.index)))?;
        io.write_u16_le(new_entry.offset as u16)?;
        io.write_u16_le(new_entry.real_size as u16)?;

        Ok(Some(DirShift {
            at: count as u64 * FAT_ENTRY_LEN,
            delta: FAT_ENTRY_LEN as i64,
        }))
    }

    fn pre_remove(
        &mut self,
        _io: &mut SegStream,
        count: usize,
        _entry: &Entry,
    ) -> Result<Option<DirShift>> {
        Ok(Some(DirShift {
            at: count as u64 * FAT_ENTRY_LEN,
            delta: -(FAT_ENTRY_LEN as i64),
        }))
    }

    fn remove_dir_entry(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.remove(row_pos(entry.index), FAT_ENTRY_LEN)
    }

    fn update_offset(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(row_pos(entry.index)))?;
        io.write_u16_le(entry.offset as u16)
    }

    fn update_size(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(row_pos(entry.index) + 2))?;
        io.write_u16_le(entry.real_size as u16)
    }
}

fn caps() -> Caps {
    Caps {
        filenames: false,
        max_name_len: 0,
        folders: false,
        case_sensitive: false,
        writable: true,
        fixed_count: false,
    }
}

fn parse(content: &SharedStream) -> Result<Vec<Entry>> {
    let mut c = content.borrow_mut();
    let len = c.len();
    let mut entries = Vec::new();
    if len == 0 {
        return Ok(entries);
    }

    c.seek(SeekFrom::Start(0))?;
    let mut off_cur = c.read_u16_le()? as u64;
    let num_files = (off_cur / FAT_ENTRY_LEN) as usize;
    for i in 0..num_files {
        let len_decomp = c.read_u16_le()? as u64;
        let off_next = if i < num_files - 1 {
            c.read_u16_le()? as u64
        } else {
            len
        };
        entries.push(Entry {
            filetype: "map/skyroads".to_string(),
            stored_size: off_next - off_cur,
            real_size: len_decomp,
            offset: off_cur,
            filter: "lzs-skyroads".to_string(),
            ..Entry::default()
        });
        off_cur = off_next;
    }
    Ok(entries)
}

/// The SkyRoads roads.lzs adapter.
pub struct RoadsSkyRoadsFormat;

impl ArchiveFormat for RoadsSkyRoadsFormat {
    fn code(&self) -> &'static str {
        "roads-skyroads"
    }

    fn friendly_name(&self) -> &'static str {
        "SkyRoads Roads File"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["lzs"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["SkyRoads"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        let len = content.len();
        // An empty file is a valid archive with no files.
        if len == 0 {
            return Ok(Certainty::DefinitelyYes);
        }
        if len < 2 {
            return Ok(Certainty::DefinitelyNo);
        }
        content.seek(SeekFrom::Start(0))?;
        let len_fat = content.read_u16_le()? as u64;
        if len_fat > len {
            return Ok(Certainty::DefinitelyNo);
        }
        if len_fat < FAT_ENTRY_LEN {
            return Ok(Certainty::DefinitelyNo);
        }
        if len_fat % FAT_ENTRY_LEN != 0 {
            return Ok(Certainty::DefinitelyNo);
        }

        content.seek(SeekFrom::Start(0))?;
        let mut off_prev = 0u64;
        for _ in 0..len_fat / FAT_ENTRY_LEN {
            let off_entry = content.read_u16_le()? as u64;
            let len_decomp = content.read_u16_le()? as u64;
            if off_entry > len {
                return Ok(Certainty::DefinitelyNo);
            }
            // Offsets must not decrease, and assuming no file is
            // zero-length helps avoid false positives with Sango .dat
            // files.
            if off_entry < off_prev {
                return Ok(Certainty::DefinitelyNo);
            }
            if len_decomp == 0 {
                return Ok(Certainty::DefinitelyNo);
            }
            off_prev = off_entry;
        }
        Ok(Certainty::DefinitelyYes)
    }

    fn open(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let entries = parse(&content)?;
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(RoadsSkyRoadsLayout),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(RoadsSkyRoadsLayout),
            FIRST_FILE_OFFSET,
            caps(),
            Vec::new(),
        )))
    }
}
