//! Dangerous Dave .EXE as a fixed archive.
//!
//! The original game keeps all its assets at hard-coded offsets
//! inside the 172848-byte executable. The two tileset slots are
//! RLE-compressed with a u32le decompressed-size prefix immediately
//! before each slot, maintained through a resize hook so the game
//! still knows where the pixels end.

use retroarc_core::archive::Archive;
use retroarc_core::entry::Entry;
use retroarc_core::error::{Error, Result};
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};

use crate::fixed::{FixedArchive, FixedFile};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const EXE_LEN: u64 = 172848;
const CHECK_OFFSET: u64 = 0x26A80;
const CHECK_STRING: &[u8] = b"Trouble loading tileset!$";

const SIZE_LEVEL: u64 = 256 + 100 * 10 + 24;

const fn level_offset(n: u64) -> u64 {
    0x26E0A + SIZE_LEVEL * n
}

/// Update the decompressed-size field for the RLE-compressed tileset
/// slots. Queried once at open time, then on every resize.
fn ddave_resize(
    io: &mut dyn Stream,
    file: &FixedFile,
    entry: &mut Entry,
    new_sizes: Option<(u64, u64)>,
) -> Result<()> {
    match new_sizes {
        None => {
            io.seek(SeekFrom::Start(file.offset - 4))?;
            entry.real_size = io.read_u32_le()? as u64;
            Ok(())
        }
        Some((new_stored, new_real)) => {
            if new_stored > file.size {
                return Err(Error::invalid_argument(
                    "there is not enough space in the Dangerous Dave .exe file to fit this data",
                ));
            }
            io.seek(SeekFrom::Start(file.offset - 4))?;
            io.write_u32_le(new_real as u32)?;
            // The stored size stays at the slot size; with the
            // decompressed size up front the game ignores the slack.
            entry.real_size = new_real;
            Ok(())
        }
    }
}

fn file_list() -> Vec<FixedFile> {
    let mut files = vec![
        FixedFile {
            offset: 0x0B4FF,
            size: 0x0C620 - 0x0B4FF,
            name: "first.bin",
            filter: "",
            resize: None,
        },
        // +4/-4 skips the u32le decompressed-size prefix.
        FixedFile {
            offset: 0x0C620 + 4,
            size: 0x120F0 - 0x0C620 - 4,
            name: "cgadave.dav",
            filter: "rle-ddave",
            resize: Some(ddave_resize),
        },
        FixedFile {
            offset: 0x120F0 + 4,
            size: 0x1C4E0 - 0x120F0 - 4,
            name: "vgadave.dav",
            filter: "rle-ddave",
            resize: Some(ddave_resize),
        },
        FixedFile {
            offset: 0x1C4E0,
            size: 0x1D780 - 0x1C4E0,
            name: "sounds.spk",
            filter: "",
            resize: None,
        },
        FixedFile {
            offset: 0x1D780,
            size: 0x1EA40 - 0x1D780,
            name: "menucga.gfx",
            filter: "",
            resize: None,
        },
        FixedFile {
            offset: 0x1EA40,
            size: 0x20EC0 - 0x1EA40,
            name: "menuega.gfx",
            filter: "",
            resize: None,
        },
        FixedFile {
            offset: 0x20EC0,
            size: 0x256C0 - 0x20EC0,
            name: "menuvga.gfx",
            filter: "",
            resize: None,
        },
        FixedFile {
            offset: 0x26B0A,
            size: 768,
            name: "vga.pal",
            filter: "",
            resize: None,
        },
    ];
    const LEVEL_NAMES: [&str; 10] = [
        "level01.dav",
        "level02.dav",
        "level03.dav",
        "level04.dav",
        "level05.dav",
        "level06.dav",
        "level07.dav",
        "level08.dav",
        "level09.dav",
        "level10.dav",
    ];
    for (i, &name) in LEVEL_NAMES.iter().enumerate() {
        files.push(FixedFile {
            offset: level_offset(i as u64),
            size: SIZE_LEVEL,
            name,
            filter: "",
            resize: None,
        });
    }
    files
}

/// The Dangerous Dave executable adapter.
pub struct ExeDDaveFormat;

impl ArchiveFormat for ExeDDaveFormat {
    fn code(&self) -> &'static str {
        "exe-ddave"
    }

    fn friendly_name(&self) -> &'static str {
        "Dangerous Dave Executable"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["exe"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Dangerous Dave"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        if content.len() != EXE_LEN {
            return Ok(Certainty::DefinitelyNo);
        }
        // No version strings, so check some data unlikely to be
        // modded.
        content.seek(SeekFrom::Start(CHECK_OFFSET))?;
        let mut buf = [0u8; 25];
        content.read_exact(&mut buf)?;
        if buf == CHECK_STRING {
            Ok(Certainty::DefinitelyYes)
        } else {
            Ok(Certainty::DefinitelyNo)
        }
    }

    fn open(&self, content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        Ok(Box::new(FixedArchive::new(content, file_list())?))
    }

    fn create(&self, _content: SharedStream, _supp: &mut SuppData) -> Result<Box<dyn Archive>> {
        // This isn't a true archive so we can't make new ones.
        Err(Error::invalid_operation(
            "cannot create a new archive in this format",
        ))
    }
}
