//! Format registry and auto-detection.
//!
//! Every concrete archive format registers an [`ArchiveFormat`] here.
//! Given an unknown stream, [`detect`] runs each format's
//! `is_instance` probe and returns the candidates ranked by how sure
//! the probe was; the caller picks one and opens the stream through
//! its adapter.

use std::collections::HashMap;

use retroarc_core::archive::Archive;
use retroarc_core::error::Result;
use retroarc_core::stream::{ReadStream, SharedStream};

use crate::fmt;

/// How confident a probe is that a stream is in its format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Certainty {
    /// Signature match; this is the format.
    DefinitelyYes,
    /// Data is consistent with the format but there is no signature.
    PossiblyYes,
    /// Nothing identifying either way.
    Unsure,
    /// Data cannot be in this format.
    DefinitelyNo,
}

/// Role of a supplementary stream a format needs besides its main
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppItem {
    /// The file allocation table lives in this stream.
    Fat,
}

/// Supplementary streams keyed by role.
pub type SuppData = HashMap<SuppItem, SharedStream>;

/// A registered archive format adapter.
pub trait ArchiveFormat {
    /// Short string code, e.g. `"hog-descent"`.
    fn code(&self) -> &'static str;

    /// Human-readable format name.
    fn friendly_name(&self) -> &'static str;

    /// Usual file extensions, lowercase, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Games known to use the format.
    fn games(&self) -> &'static [&'static str];

    /// Probe a stream for this format.
    fn is_instance(&self, content: &mut dyn ReadStream) -> Result<Certainty>;

    /// Open an existing archive.
    fn open(&self, content: SharedStream, supp: &mut SuppData) -> Result<Box<dyn Archive>>;

    /// Initialise an empty archive in this format.
    fn create(&self, content: SharedStream, supp: &mut SuppData) -> Result<Box<dyn Archive>>;

    /// Supplementary files the format needs, as (role, filename)
    /// pairs derived from the archive's own filename.
    fn required_supps(&self, _archive_filename: &str) -> Vec<(SuppItem, String)> {
        Vec::new()
    }
}

/// Every registered format adapter.
pub fn all_formats() -> Vec<Box<dyn ArchiveFormat>> {
    vec![
        Box::new(fmt::dat_hugo::DatHugoFormat),
        Box::new(fmt::dat_wacky::DatWackyFormat),
        Box::new(fmt::glb_raptor::GlbRaptorFormat),
        Box::new(fmt::hog_descent::HogDescentFormat),
        Box::new(fmt::pcxlib::PcxLibFormat),
        Box::new(fmt::res_stellar7::ResStellar7Format),
        Box::new(fmt::roads_skyroads::RoadsSkyRoadsFormat),
        Box::new(fmt::gd_doofus::GdDoofusFormat),
        Box::new(fmt::exe_ddave::ExeDDaveFormat),
        Box::new(fmt::da_levels::DaLevelsFormat),
    ]
}

/// Look a format up by its code.
pub fn format_by_code(code: &str) -> Option<Box<dyn ArchiveFormat>> {
    all_formats().into_iter().find(|f| f.code() == code)
}

/// Probe `content` against every format, returning candidate codes
/// ranked most-certain first. `DefinitelyNo` results are dropped.
pub fn detect(content: &mut dyn ReadStream) -> Result<Vec<(&'static str, Certainty)>> {
    let mut matches = Vec::new();
    for format in all_formats() {
        content.seek(retroarc_core::stream::SeekFrom::Start(0))?;
        let certainty = format.is_instance(content)?;
        if certainty != Certainty::DefinitelyNo {
            matches.push((format.code(), certainty));
        }
    }
    matches.sort_by_key(|&(_, c)| c);
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_unique() {
        let formats = all_formats();
        for (i, a) in formats.iter().enumerate() {
            for b in &formats[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert!(format_by_code("hog-descent").is_some());
        assert!(format_by_code("dat-wacky").is_some());
        assert!(format_by_code("zip").is_none());
    }

    #[test]
    fn test_certainty_ranking() {
        assert!(Certainty::DefinitelyYes < Certainty::PossiblyYes);
        assert!(Certainty::PossiblyYes < Certainty::Unsure);
    }
}
