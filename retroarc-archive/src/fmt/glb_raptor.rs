//! Raptor .GLB format.
//!
//! Layout: a 28-byte header row (signature plus u32le file count at
//! offset 4), then one 28-byte row per file (u32le flags, u32le
//! offset, u32le size, 16-byte null-padded name), then the payloads.
//! The entire header + FAT region is encrypted with the additive
//! cipher, restarting every row; flag 1 marks a file body encrypted
//! with the same cipher run over the whole file.
//!
//! The adapter keeps a decrypted copy of the FAT in memory, edits
//! that, and re-encrypts it over the real FAT region on flush.

use std::rc::Rc;

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry, EntryAttrs, FILETYPE_GENERIC};
use retroarc_core::error::{Error, Result};
use retroarc_core::filter::run_filter;
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{MemStream, ReadStream, SeekFrom, SharedStream, Stream, shared};

use retroarc_filters::{GLB_FAT_BLOCK, GLB_KEY, GlbDecrypt, GlbEncrypt};

use crate::fat::{DirShift, FatArchive, FatLayout, SharedSeg};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const FILECOUNT_OFFSET: u64 = 4;
const HEADER_LEN: u64 = 28;
const FAT_OFFSET: u64 = HEADER_LEN;
const FILENAME_FIELD_LEN: usize = 16;
const MAX_FILENAME_LEN: usize = FILENAME_FIELD_LEN - 1;
const FAT_ENTRY_LEN: u64 = 28;
const FIRST_FILE_OFFSET: u64 = FAT_OFFSET;

/// Maximum value we will load.
const SAFETY_MAX_FILECOUNT: usize = 8192;

/// The empty header, pre-encrypted: 28 zero bytes through the FAT
/// cipher.
const EMPTY_HEADER: [u8; 28] = [
    0x64, 0x9B, 0xD1, 0x09, 0x50, 0x9C, 0xDE, 0x11, 0x43, 0x7A, 0xB0, 0xE8, 0x2F, 0x7B, 0xBD,
    0xF0, 0x22, 0x59, 0x8F, 0xC7, 0x0E, 0x5A, 0x9C, 0xCF, 0x01, 0x38, 0x6E, 0xA6,
];

fn row_pos(index: usize) -> u64 {
    FAT_OFFSET + index as u64 * FAT_ENTRY_LEN
}

struct GlbRaptorLayout {
    /// Decrypted working copy of header + FAT.
    fat: SharedSeg,
}

impl GlbRaptorLayout {
    fn with_fat<R>(&self, f: impl FnOnce(&mut SegStream) -> Result<R>) -> Result<R> {
        let mut fat = self.fat.borrow_mut();
        f(&mut fat)
    }
}

impl FatLayout for GlbRaptorLayout {
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        new_entry.header_len = 0;
        new_entry.offset += FAT_ENTRY_LEN;
        new_entry.name = new_entry.name.to_uppercase();
        let flags: u32 = if new_entry
            .attrs
            .intersects(EntryAttrs::ENCRYPTED | EntryAttrs::COMPRESSED)
        {
            new_entry.attrs |= EntryAttrs::ENCRYPTED;
            new_entry.filter = "glb-raptor".to_string();
            1
        } else {
            0
        };

        // The row occupies space in both the working FAT copy and the
        // real archive.
        let pos = row_pos(new_entry.index);
        io.insert(pos, FAT_ENTRY_LEN)?;
        self.with_fat(|fat| {
            fat.insert(pos, FAT_ENTRY_LEN)?;
            fat.seek(SeekFrom::Start(pos))?;
            fat.write_u32_le(flags)?;
            fat.write_u32_le(new_entry.offset as u32)?;
            fat.write_u32_le(new_entry.stored_size as u32)?;
            fat.write_name(&new_entry.name, FILENAME_FIELD_LEN)
        })?;

        Ok(Some(DirShift {
            at: FAT_OFFSET + count as u64 * FAT_ENTRY_LEN,
            delta: FAT_ENTRY_LEN as i64,
        }))
    }

    fn post_insert(&mut self, _io: &mut SegStream, count: usize) -> Result<()> {
        self.with_fat(|fat| {
            fat.seek(SeekFrom::Start(FILECOUNT_OFFSET))?;
            fat.write_u32_le(count as u32)
        })
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
        let pos = row_pos(entry.index);
        io.remove(pos, FAT_ENTRY_LEN)?;
        self.with_fat(|fat| fat.remove(pos, FAT_ENTRY_LEN))
    }

    fn post_remove(&mut self, _io: &mut SegStream, count: usize) -> Result<()> {
        self.with_fat(|fat| {
            fat.seek(SeekFrom::Start(FILECOUNT_OFFSET))?;
            fat.write_u32_le(count as u32)
        })
    }

    fn update_name(&mut self, _io: &mut SegStream, entry: &Entry) -> Result<()> {
        self.with_fat(|fat| {
            fat.seek(SeekFrom::Start(row_pos(entry.index) + 12))?;
            fat.write_name(&entry.name, FILENAME_FIELD_LEN)
        })
    }

    fn update_offset(&mut self, _io: &mut SegStream, entry: &Entry) -> Result<()> {
        self.with_fat(|fat| {
            fat.seek(SeekFrom::Start(row_pos(entry.index) + 4))?;
            fat.write_u32_le(entry.offset as u32)
        })
    }

    fn update_size(&mut self, _io: &mut SegStream, entry: &Entry) -> Result<()> {
        self.with_fat(|fat| {
            fat.seek(SeekFrom::Start(row_pos(entry.index) + 8))?;
            fat.write_u32_le(entry.stored_size as u32)
        })
    }

    fn flush(&mut self, io: &mut SegStream) -> Result<()> {
        // Re-encrypt the working copy over the real FAT region.
        let plain = self.with_fat(|fat| {
            fat.seek(SeekFrom::Start(0))?;
            fat.read_to_end()
        })?;
        let crypted = run_filter(
            &mut GlbEncrypt::new(GLB_KEY, GLB_FAT_BLOCK),
            &plain,
            None,
        )?;
        io.seek(SeekFrom::Start(0))?;
        io.write(&crypted)
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

fn parse(content: &SharedStream) -> Result<(Vec<Entry>, SharedSeg)> {
    // Decode just enough of the FAT to learn the file count, then
    // copy the whole region into memory in the clear.
    let mut c = content.borrow_mut();
    c.seek(SeekFrom::Start(0))?;
    let mut raw_header = vec![0u8; HEADER_LEN as usize];
    c.read_exact(&mut raw_header)?;
    let header = run_filter(
        &mut GlbDecrypt::new(GLB_KEY, GLB_FAT_BLOCK),
        &raw_header,
        None,
    )?;
    let num_files =
        u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if num_files >= SAFETY_MAX_FILECOUNT {
        return Err(Error::invalid_format("too many files or corrupted archive"));
    }

    let fat_len = HEADER_LEN + num_files as u64 * FAT_ENTRY_LEN;
    c.seek(SeekFrom::Start(0))?;
    let mut raw_fat = vec![0u8; fat_len as usize];
    c.read_exact(&mut raw_fat)?;
    drop(c);
    let plain = run_filter(&mut GlbDecrypt::new(GLB_KEY, GLB_FAT_BLOCK), &raw_fat, None)?;

    let fat_mem = shared(MemStream::from_vec(plain));
    let mut entries = Vec::with_capacity(num_files);
    {
        let mut fat = fat_mem.borrow_mut();
        fat.seek(SeekFrom::Start(FAT_OFFSET))?;
        for _ in 0..num_files {
            let flags = fat.read_u32_le()?;
            let offset = fat.read_u32_le()? as u64;
            let stored_size = fat.read_u32_le()? as u64;
            let name = fat.read_name(FILENAME_FIELD_LEN)?;
            let mut entry = Entry {
                name,
                filetype: FILETYPE_GENERIC.to_string(),
                stored_size,
                real_size: stored_size,
                offset,
                ..Entry::default()
            };
            if flags == 0x01 {
                entry.attrs |= EntryAttrs::ENCRYPTED;
                entry.filter = "glb-raptor".to_string();
            }
            entries.push(entry);
        }
    }
    Ok((entries, SegStream::new_shared(fat_mem)))
}

/// The Raptor .GLB adapter.
pub struct GlbRaptorFormat;

impl ArchiveFormat for GlbRaptorFormat {
    fn code(&self) -> &'static str {
        "glb-raptor"
    }

    fn friendly_name(&self) -> &'static str {
        "Raptor GLB File"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["glb"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Raptor"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        if content.len() < 4 {
            return Ok(Certainty::DefinitelyNo);
        }
        let mut sig = [0u8; 4];
        content.seek(SeekFrom::Start(0))?;
        content.read_exact(&mut sig)?;
        // The signature is good enough; no need to validate offsets.
        if sig == EMPTY_HEADER[..4] {
            Ok(Certainty::DefinitelyYes)
        } else {
            Ok(Certainty::DefinitelyNo)
        }
    }

    fn open(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let (entries, fat) = parse(&content)?;
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(GlbRaptorLayout { fat }),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        {
            let mut c = content.borrow_mut();
            c.seek(SeekFrom::Start(0))?;
            c.write(&EMPTY_HEADER)?;
        }
        let fat_mem = shared(MemStream::from_vec(vec![0u8; HEADER_LEN as usize]));
        let fat = SegStream::new_shared(fat_mem);
        let io = SegStream::new_shared(Rc::clone(&content));
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(GlbRaptorLayout { fat }),
            FIRST_FILE_OFFSET,
            caps(),
            Vec::new(),
        )))
    }
}
