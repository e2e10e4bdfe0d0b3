//! Hugo scenery .DAT format.
//!
//! Layout: a FAT of (u32le offset, u32le size) pairs with no count
//! field - the first file's offset doubles as the FAT length - then
//! the nameless payloads. Hugo II and III split their scenery across
//! a scenery1.dat / scenery2.dat pair: the second file's directory
//! lives at the end of the first file's FAT, so opening scenery2.dat
//! takes scenery1.dat as a supplementary FAT stream.

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry, FILETYPE_GENERIC};
use retroarc_core::error::Result;
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};

use crate::fat::{DirShift, FatArchive, FatLayout, SharedSeg};
use crate::registry::{ArchiveFormat, Certainty, SuppData, SuppItem};

const FAT_ENTRY_LEN: u64 = 8;
const FIRST_FILE_OFFSET: u64 = 0;

/// Where this archive's directory rows live.
enum FatHome {
    /// In the archive itself, ahead of the payloads.
    Content,
    /// In a sibling file; rows start `base` entries in.
    Supp { fat: SharedSeg, base: usize },
}

struct DatHugoLayout {
    home: FatHome,
}

impl DatHugoLayout {
    fn row_pos(&self, index: usize) -> u64 {
        let base = match &self.home {
            FatHome::Content => 0,
            FatHome::Supp { base, .. } => *base,
        };
        (base + index) as u64 * FAT_ENTRY_LEN
    }

    fn write_row(&mut self, io: &mut SegStream, pos: u64, offset: u32, size: u32) -> Result<()> {
        match &self.home {
            FatHome::Content => {
                io.seek(SeekFrom::Start(pos))?;
                io.write_u32_le(offset)?;
                io.write_u32_le(size)
            }
            FatHome::Supp { fat, .. } => {
                let mut fat = fat.borrow_mut();
                fat.seek(SeekFrom::Start(pos))?;
                fat.write_u32_le(offset)?;
                fat.write_u32_le(size)
            }
        }
    }
}

impl FatLayout for DatHugoLayout {
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        new_entry.header_len = 0;
        let pos = self.row_pos(new_entry.index);
        match &self.home {
            FatHome::Content => {
                new_entry.offset += FAT_ENTRY_LEN;
                io.insert(pos, FAT_ENTRY_LEN)?;
            }
            FatHome::Supp { fat, .. } => {
                fat.borrow_mut().insert(pos, FAT_ENTRY_LEN)?;
            }
        }
        self.write_row(io, pos, new_entry.offset as u32, new_entry.stored_size as u32)?;
        Ok(match self.home {
            FatHome::Content => Some(DirShift {
                at: count as u64 * FAT_ENTRY_LEN,
                delta: FAT_ENTRY_LEN as i64,
            }),
            FatHome::Supp { .. } => None,
        })
    }

    fn pre_remove(
        &mut self,
        _io: &mut SegStream,
        count: usize,
        _entry: &Entry,
    ) -> Result<Option<DirShift>> {
        Ok(match self.home {
            FatHome::Content => Some(DirShift {
                at: count as u64 * FAT_ENTRY_LEN,
                delta: -(FAT_ENTRY_LEN as i64),
            }),
            FatHome::Supp { .. } => None,
        })
    }

    fn remove_dir_entry(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        let pos = self.row_pos(entry.index);
        match &self.home {
            FatHome::Content => io.remove(pos, FAT_ENTRY_LEN),
            FatHome::Supp { fat, .. } => fat.borrow_mut().remove(pos, FAT_ENTRY_LEN),
        }
    }

    fn update_offset(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        let pos = self.row_pos(entry.index);
        let (offset, size) = (entry.offset as u32, entry.stored_size as u32);
        self.write_row(io, pos, offset, size)
    }

    fn update_size(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        self.update_offset(io, entry)
    }

    fn flush(&mut self, _io: &mut SegStream) -> Result<()> {
        if let FatHome::Supp { fat, .. } = &self.home {
            fat.borrow_mut().commit()?;
        }
        Ok(())
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

struct ParsedFat {
    entries: Vec<Entry>,
    /// Row index where the second archive's directory begins.
    second_base: usize,
}

fn parse(fat_stream: &SharedStream, want_second: bool) -> Result<ParsedFat> {
    let mut c = fat_stream.borrow_mut();
    let len = c.len();
    if len == 0 {
        return Ok(ParsedFat {
            entries: Vec::new(),
            second_base: 0,
        });
    }
    if len < FAT_ENTRY_LEN {
        return Err(retroarc_core::error::Error::invalid_format(
            "archive too short - no FAT terminator",
        ));
    }
    c.seek(SeekFrom::Start(0))?;
    let fat_end = c.read_u32_le()? as u64;
    if fat_end >= len && want_second {
        // A combined FAT must at least fit in the first file.
        return Err(retroarc_core::error::Error::invalid_format(
            "archive corrupt - FAT truncated",
        ));
    }
    let num_files = (fat_end / FAT_ENTRY_LEN) as usize;

    c.seek(SeekFrom::Start(0))?;
    let mut entries = Vec::new();
    let mut last_offset = 0u64;
    let mut cur_file = 1;
    let mut second_base = 0usize;
    for i in 0..num_files {
        let offset = c.read_u32_le()? as u64;
        let stored_size = c.read_u32_le()? as u64;

        // Offsets dropping back means we crossed into the second
        // archive's directory.
        if offset != 0 || stored_size != 0 {
            if offset < last_offset {
                cur_file += 1;
                second_base = i;
            }
            last_offset = offset;
        }

        let wanted = if want_second {
            cur_file == 2
        } else {
            cur_file == 1
        };
        if wanted {
            entries.push(Entry {
                filetype: FILETYPE_GENERIC.to_string(),
                stored_size,
                real_size: stored_size,
                offset,
                ..Entry::default()
            });
        }
    }
    Ok(ParsedFat {
        entries,
        second_base,
    })
}

/// The Hugo scenery .DAT adapter.
pub struct DatHugoFormat;

impl ArchiveFormat for DatHugoFormat {
    fn code(&self) -> &'static str {
        "dat-hugo"
    }

    fn friendly_name(&self) -> &'static str {
        "Hugo DAT File"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dat"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Hugo II, Whodunit?", "Hugo III, Jungle of Doom!"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        let len = content.len();
        // With no header an empty file could be in this format.
        if len == 0 {
            return Ok(Certainty::PossiblyYes);
        }
        if len < FAT_ENTRY_LEN {
            return Ok(Certainty::DefinitelyNo);
        }
        content.seek(SeekFrom::Start(0))?;
        let fat_end = content.read_u32_le()? as u64;
        let first_len = content.read_u32_le()? as u64;
        if fat_end + first_len > len {
            return Ok(Certainty::DefinitelyNo);
        }
        if fat_end % FAT_ENTRY_LEN != 0 {
            return Ok(Certainty::DefinitelyNo);
        }
        let num_files = fat_end / FAT_ENTRY_LEN;

        let mut off_entry = fat_end;
        let mut len_entry = first_len;
        for _ in 1..num_files {
            off_entry = content.read_u32_le()? as u64;
            len_entry = content.read_u32_le()? as u64;
            if off_entry + len_entry > len {
                return Ok(Certainty::DefinitelyNo);
            }
        }
        if off_entry + len_entry != len {
            // Trailing data; could be one of the similar formats.
            return Ok(Certainty::Unsure);
        }
        Ok(Certainty::DefinitelyYes)
    }

    fn open(&self, content: SharedStream, supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let (entries, home) = match supp.get(&SuppItem::Fat) {
            Some(fat_stream) => {
                let parsed = parse(fat_stream, true)?;
                let fat = SegStream::new_shared(std::rc::Rc::clone(fat_stream));
                (
                    parsed.entries,
                    FatHome::Supp {
                        fat,
                        base: parsed.second_base,
                    },
                )
            }
            None => {
                let parsed = parse(&content, false)?;
                (parsed.entries, FatHome::Content)
            }
        };
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(DatHugoLayout { home }),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        // An empty file is a valid empty archive.
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(DatHugoLayout {
                home: FatHome::Content,
            }),
            FIRST_FILE_OFFSET,
            caps(),
            Vec::new(),
        )))
    }

    fn required_supps(&self, archive_filename: &str) -> Vec<(SuppItem, String)> {
        let base = archive_filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(archive_filename);
        if base.eq_ignore_ascii_case("scenery2.dat") {
            let mut first = archive_filename.to_string();
            let cut = first.len() - 5;
            first.replace_range(cut..cut + 1, "1");
            vec![(SuppItem::Fat, first)]
        } else {
            Vec::new()
        }
    }
}
