//! Dark Ages level data as a fixed archive.
//!
//! Ten levels of exactly 1152 bytes each, back to back, with no
//! header of any kind. Only the slot contents can change.

use retroarc_core::archive::Archive;
use retroarc_core::error::{Error, Result};
use retroarc_core::stream::{ReadStream, SharedStream};

use crate::fixed::{FixedArchive, FixedFile};
use crate::registry::{ArchiveFormat, Certainty, SuppData};

const LEVEL_SIZE: u64 = 1152;
const LEVEL_COUNT: u64 = 10;

fn file_list() -> Vec<FixedFile> {
    const NAMES: [&str; LEVEL_COUNT as usize] = [
        "l01.dal", "l02.dal", "l03.dal", "l04.dal", "l05.dal", "l06.dal", "l07.dal", "l08.dal",
        "l09.dal", "l10.dal",
    ];
    NAMES
        .iter()
        .enumerate()
        .map(|(i, &name)| FixedFile {
            offset: LEVEL_SIZE * i as u64,
            size: LEVEL_SIZE,
            name,
            filter: "",
            resize: None,
        })
        .collect()
}

/// The Dark Ages level file adapter.
pub struct DaLevelsFormat;

impl ArchiveFormat for DaLevelsFormat {
    fn code(&self) -> &'static str {
        "da-levels"
    }

    fn friendly_name(&self) -> &'static str {
        "Dark Ages levels"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["da1", "da2", "da3"]
    }

    fn games(&self) -> &'static [&'static str] {
        &["Dark Ages"]
    }

    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty> {
        if content.len() == LEVEL_SIZE * LEVEL_COUNT {
            Ok(Certainty::PossiblyYes)
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
