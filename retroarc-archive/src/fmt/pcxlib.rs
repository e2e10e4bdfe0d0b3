//! PCX Library (.PCL) format.
//!
//! Layout: a 128-byte header (u16le version 0xCA01, a 50-byte
//! copyright string, a 42-byte label area, u16le file count, 32
//! reserved bytes), then 26-byte rows: a zero sync byte, 8-byte
//! space-padded name, 5-byte space-padded extension with the dot,
//! u32le offset, u32le size, and DOS date/time words the library
//! writer leaves zeroed. The copyright text is exposed as a bounded
//! text attribute.

use retroarc_core::archive::{Archive, Attribute, AttributeKind, AttributeValue};
use retroarc_core::entry::{Caps, Entry, FILETYPE_GENERIC};
use retroarc_core::error::{Error, Result};
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};

use crate::fat::{DirShift, FatArchive, FatLayout};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const VERSION: u16 = 0xCA01;
const COPYRIGHT_OFFSET: u64 = 2;
const COPYRIGHT_LEN: usize = 50;
const FILECOUNT_OFFSET: u64 = 2 + 50 + 42;
const FAT_OFFSET: u64 = 2 + 50 + 42 + 2 + 32;
const FAT_ENTRY_LEN: u64 = 1 + 13 + 4 + 4 + 2 + 2;
const MAX_FILENAME_LEN: usize = 12;
const MAX_FILES: usize = 65535;
const FIRST_FILE_OFFSET: u64 = FAT_OFFSET;

const DEFAULT_COPYRIGHT: &str = "Copyright (c) Genus Microprogramming, Inc. 1988-90";

fn row_pos(index: usize) -> u64 {
    FAT_OFFSET + index as u64 * FAT_ENTRY_LEN
}

/// Split "NAME.EXT" into the space-padded 8 + 5 header fields.
fn split_name(name: &str) -> Result<(String, String)> {
    let (base, ext) = match name.rfind('.') {
        Some(pos) => (&name[..pos], &name[pos..]),
        None => (name, ""),
    };
    if base.len() > 8 {
        return Err(Error::invalid_argument(
            "filename part too long - eight letters max",
        ));
    }
    if ext.len() > 4 {
        return Err(Error::invalid_argument(
            "filename extension too long - three letters max",
        ));
    }
    let mut base = base.to_string();
    while base.len() < 8 {
        base.push(' ');
    }
    let mut ext = ext.to_string();
    while ext.len() < 4 {
        ext.push(' ');
    }
    Ok((base, ext))
}

/// Read one 8+5 name pair back into "NAME.EXT" form.
fn join_name(raw_name: &[u8], raw_ext: &[u8]) -> String {
    let take = |raw: &[u8]| -> String {
        raw.iter()
            .take_while(|&&b| b != 0 && b != b' ')
            .map(|&b| b as char)
            .collect()
    };
    format!("{}{}", take(raw_name), take(raw_ext))
}

fn write_name_fields(io: &mut SegStream, name: &str) -> Result<()> {
    let (base, ext) = split_name(name)?;
    io.write_name(&base, 8)?;
    io.write_name(&ext, 5)
}

struct PcxLibLayout {
    copyright: String,
}

impl FatLayout for PcxLibLayout {
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>> {
        if count >= MAX_FILES {
            return Err(Error::invalid_operation(format!(
                "too many files, the maximum is {}",
                MAX_FILES
            )));
        }
        new_entry.header_len = 0;
        new_entry.offset += FAT_ENTRY_LEN;
        new_entry.name = new_entry.name.to_uppercase();
        // Validate the name split before any bytes move.
        let (base, ext) = split_name(&new_entry.name)?;

        io.insert(row_pos(new_entry.index), FAT_ENTRY_LEN)?;
        io.seek(SeekFrom::Start(row_pos(new_entry.index)))?;
        io.write_u8(0)?; // sync byte
        io.write_name(&base, 8)?;
        io.write_name(&ext, 5)?;
        io.write_u32_le(new_entry.offset as u32)?;
        io.write_u32_le(new_entry.stored_size as u32)?;
        io.write_u16_le(0)?; // date
        io.write_u16_le(0)?; // time

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
        io.seek(SeekFrom::Start(row_pos(entry.index) + 1))?;
        write_name_fields(io, &entry.name)
    }

    fn update_offset(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(row_pos(entry.index) + 14))?;
        io.write_u32_le(entry.offset as u32)
    }

    fn update_size(&mut self, io: &mut SegStream, entry: &Entry) -> Result<()> {
        io.seek(SeekFrom::Start(row_pos(entry.index) + 18))?;
        io.write_u32_le(entry.stored_size as u32)
    }

    fn attributes(&self) -> Vec<Attribute> {
        vec![Attribute {
            name: "description",
            kind: AttributeKind::Text {
                max_len: COPYRIGHT_LEN,
            },
            value: AttributeValue::Text(self.copyright.clone()),
        }]
    }

    fn set_attribute(
        &mut self,
        io: &mut SegStream,
        index: usize,
        value: AttributeValue,
    ) -> Result<Option<DirShift>> {
        if index != 0 {
            return Err(Error::invalid_argument("no such attribute"));
        }
        let AttributeValue::Text(text) = value else {
            return Err(Error::invalid_argument("description must be text"));
        };
        if text.len() > COPYRIGHT_LEN {
            return Err(Error::invalid_argument(format!(
                "description is limited to {} characters",
                COPYRIGHT_LEN
            )));
        }
        io.seek(SeekFrom::Start(COPYRIGHT_OFFSET))?;
        io.write_name(&text, COPYRIGHT_LEN)?;
        self.copyright = text;
        // Fixed-size field; the FAT does not move.
        Ok(None)
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

fn parse(content: &SharedStream) -> Result<(Vec<Entry>, String)> {
    let mut c = content.borrow_mut();
    if c.len() < FAT_OFFSET {
        return Err(Error::invalid_format("truncated file"));
    }
    c.seek(SeekFrom::Start(COPYRIGHT_OFFSET))?;
    let copyright = c.read_name(COPYRIGHT_LEN)?;

    c.seek(SeekFrom::Start(FILECOUNT_OFFSET))?;
    let num_files = c.read_u16_le()? as usize;

    c.seek(SeekFrom::Start(FAT_OFFSET))?;
    let mut entries = Vec::with_capacity(num_files);
    for _ in 0..num_files {
        let _sync = c.read_u8()?;
        let mut raw_name = [0u8; 8];
        c.read_exact(&mut raw_name)?;
        let mut raw_ext = [0u8; 5];
        c.read_exact(&mut raw_ext)?;
        let offset = c.read_u32_le()? as u64;
        let stored_size = c.read_u32_le()? as u64;
        let _date = c.read_u16_le()?;
        let _time = c.read_u16_le()?;
        entries.push(Entry {
            name: join_name(&raw_name, &raw_ext),
            filetype: FILETYPE_GENERIC.to_string(),
            stored_size,
            real_size: stored_size,
            offset,
            ..Entry::default()
        });
    }
    Ok((entries, copyright))
}

/// The PCX Library adapter.
pub struct PcxLibFormat;

impl ArchiveFormat for PcxLibFormat {
    fn code(&self) -> &'static str {
        "pcxlib"
    }

    fn friendly_name(&self) -> &'static str {
        "PCX Library (v2)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pcl"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Word Rescue"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        let len = content.len();
        if len < FAT_OFFSET {
            return Ok(Certainty::DefinitelyNo);
        }
        content.seek(SeekFrom::Start(0))?;
        if content.read_u16_le()? != VERSION {
            return Ok(Certainty::DefinitelyNo);
        }
        content.seek(SeekFrom::Start(FILECOUNT_OFFSET))?;
        let num_files = content.read_u16_le()? as u64;
        if len < FAT_OFFSET + num_files * FAT_ENTRY_LEN {
            return Ok(Certainty::DefinitelyNo);
        }

        content.seek(SeekFrom::Start(FAT_OFFSET))?;
        for _ in 0..num_files {
            let sync = content.read_u8()?;
            let mut raw_name = [0u8; 8];
            content.read_exact(&mut raw_name)?;
            let mut raw_ext = [0u8; 5];
            content.read_exact(&mut raw_ext)?;
            let offset = content.read_u32_le()? as u64;
            let size = content.read_u32_le()? as u64;
            let _date = content.read_u16_le()?;
            let _time = content.read_u16_le()?;

            if sync != 0 {
                return Ok(Certainty::DefinitelyNo);
            }
            if raw_ext[0] != b'.' {
                return Ok(Certainty::DefinitelyNo);
            }
            if offset <= FAT_OFFSET + FAT_ENTRY_LEN {
                return Ok(Certainty::DefinitelyNo);
            }
            if offset + size > len {
                return Ok(Certainty::DefinitelyNo);
            }
        }
        Ok(Certainty::DefinitelyYes)
    }

    fn open(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        let (entries, copyright) = parse(&content)?;
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(PcxLibLayout { copyright }),
            FIRST_FILE_OFFSET,
            caps(),
            entries,
        )))
    }

    fn create(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        {
            let mut c = content.borrow_mut();
            c.seek(SeekFrom::Start(0))?;
            c.write_u16_le(VERSION)?;
            c.write_name(DEFAULT_COPYRIGHT, COPYRIGHT_LEN)?;
            c.write(&[0u8; 42])?; // label area
            c.write_u16_le(0)?; // file count
            c.write(&[0u8; 32])?; // reserved
        }
        let io = SegStream::new_shared(content);
        Ok(Box::new(FatArchive::new(
            io,
            Box::new(PcxLibLayout {
                copyright: DEFAULT_COPYRIGHT.to_string(),
            }),
            FIRST_FILE_OFFSET,
            caps(),
            Vec::new(),
        )))
    }
}
