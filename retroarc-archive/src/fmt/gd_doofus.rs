//! Doofus .G-D format.
//!
//! The data file is nothing but concatenated payloads; the directory
//! lives inside `doofus.exe` at a fixed offset, as a fixed-length run
//! of 8-byte rows (u16le size, u16le type id, four reserved bytes).
//! Unused rows are zero. Offsets are implied by summing sizes, and
//! the row count never changes - inserts consume a blank trailing row
//! and removes append one.

use std::rc::Rc;

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry, FILETYPE_GENERIC};
use retroarc_core::error::{Error, Result};
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};
use retroarc_core::sub::SubStream;

use crate::fat::{DirShift, FatArchive, FatLayout, SharedSeg};
use crate::registry::{ArchiveFormat, Certainty, SuppData, SuppItem};

const FIRST_FILE_OFFSET: u64 = 0;
const FAT_ENTRY_LEN: u64 = 8;

const TYPE_MUSIC_TBSA: u16 = 0x59EE;

fn type_tag(code: u16) -> String {
    match code {
        0x1636 => "unknown/doofus-1636".to_string(),
        0x2376 => "unknown/doofus-2376".to_string(),
        0x3276 => "unknown/doofus-3276".to_string(),
        0x3F2E => "unknown/doofus-3f2e".to_string(),
        0x3F64 => "unknown/doofus-3f64".to_string(),
        0x48BE => "unknown/doofus-48be".to_string(),
        0x43EE => "unknown/doofus-43ee".to_string(),
        TYPE_MUSIC_TBSA => "music/tbsa".to_string(),
        _ => FILETYPE_GENERIC.to_string(),
    }
}

fn type_code(tag: &str) -> u16 {
    if let Some(hex) = tag.strip_prefix("unknown/doofus-") {
        u16::from_str_radix(hex, 16).unwrap_or(0)
    } else if tag == "music/tbsa" {
        TYPE_MUSIC_TBSA
    } else {
        0
    }
}

struct GdDoofusLayout {
    fat: SharedSeg,
    max_files: usize,
    num_files: usize,
}

impl FatLayout for GdDoofusLayout {
    fn pre_insert(
        &mut self,
        _io: &mut SegStream,
        _count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        if self.num_files + 1 >= self.max_files {
            return Err(Error::invalid_operation(
                "maximum number of files reached in this archive format",
            ));
        }
        new_entry.header_len = 0;

        let mut fat = self.fat.borrow_mut();
        // Drop the last blank row so the FAT keeps its fixed size,
        // then splice the new row in.
        let fat_len = fat.len();
        fat.remove(fat_len - FAT_ENTRY_LEN, FAT_ENTRY_LEN)?;
        fat.insert(new_entry.index as u64 * FAT_ENTRY_LEN, FAT_ENTRY_LEN)?;
        fat.seek(SeekFrom::Start(new_entry.index as u64 * FAT_ENTRY_LEN))?;
        fat.write_u16_le(new_entry.stored_size as u16)?;
        fat.write_u16_le(type_code(&new_entry.filetype))?;
        fat.write(&[0u8; 4])?;
        drop(fat);

        self.num_files += 1;
        Ok(None)
    }

    fn remove_dir_entry(&mut self, _io: &mut SegStream, entry: &Entry) -> Result<()> {
        let mut fat = self.fat.borrow_mut();
        fat.remove(entry.index as u64 * FAT_ENTRY_LEN, FAT_ENTRY_LEN)?;
        // Keep the FAT length fixed with a blank row at the end.
        let fat_len = fat.len();
        fat.insert(fat_len, FAT_ENTRY_LEN)?;
        drop(fat);
        self.num_files -= 1;
        Ok(())
    }

    fn update_size(&mut self, _io: &mut SegStream, entry: &Entry) -> Result<()> {
        let mut fat = self.fat.borrow_mut();
        fat.seek(SeekFrom::Start(entry.index as u64 * FAT_ENTRY_LEN))?;
        fat.write_u16_le(entry.stored_size as u16)
    }

    fn flush(&mut self, _io: &mut SegStream) -> Result<()> {
        self.fat.borrow_mut().commit()
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

/// The Doofus .G-D adapter.
pub struct GdDoofusFormat;

impl ArchiveFormat for GdDoofusFormat {
    fn code(&self) -> &'static str {
        "gd-doofus"
    }

    fn friendly_name(&self) -> &'static str {
        "Doofus DAT File"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["g-d"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Doofus"]
    }

    fn is_instance(&self, _content: &mut dyn ReadStream) -> Result<Certainty> {
        // There is literally no identifying information in this
        // archive format.
        Ok(Certainty::Unsure)
    }

    fn open(&self, content: SharedStream, supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let exe = supp
            .get(&SuppItem::Fat)
            .ok_or_else(|| Error::invalid_argument("gd-doofus needs its doofus.exe FAT"))?;

        let (off_fat, len_fat) = match exe.borrow().len() {
            // Only known version of the game.
            580994 => (0x015372u64, 8 * 64u64),
            // Bare FAT, as used when rebuilding one from scratch.
            512 => (0, 8 * 64),
            _ => return Err(Error::invalid_format("unknown file version")),
        };

        let fat_window = SubStream::new(Rc::clone(exe), off_fat, len_fat);
        let fat_shared: SharedStream = fat_window;
        let fat = SegStream::new_shared(fat_shared);

        let len_archive = content.borrow().len();
        let max_files = (len_fat / FAT_ENTRY_LEN) as usize;
        let mut entries = Vec::new();
        {
            let mut f = fat.borrow_mut();
            f.seek(SeekFrom::Start(0))?;
            let mut off = 0u64;
            for _ in 0..max_files {
                let stored_size = f.read_u16_le()? as u64;
                let type_id = f.read_u16_le()?;
                f.seek(SeekFrom::Current(4))?;
                if stored_size == 0 {
                    continue;
                }
                if off + stored_size > len_archive {
                    return Err(Error::invalid_format(
                        "archive has been truncated or FAT is corrupt",
                    ));
                }
                entries.push(Entry {
                    filetype: type_tag(type_id),
                    stored_size,
                    real_size: stored_size,
                    offset: off,
                    ..Entry::default()
                });
                off += stored_size;
            }
        }

        let num_files = entries.len();
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(GdDoofusLayout {
                fat,
                max_files,
                num_files,
            }),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, _content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        // The FAT has to go inside a specific version of an .EXE
        // file, and we wouldn't know where that is.
        Err(Error::invalid_operation(
            "cannot create archives from scratch in this format",
        ))
    }

    fn required_supps(&self, _archive_filename: &str) -> Vec<(SuppItem, String)> {
        vec![(SuppItem::Fat, "doofus.exe".to_string())]
    }
}
