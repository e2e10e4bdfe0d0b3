//! CLI subcommand implementations.

mod detect;
mod extract;
mod list;
mod modify;

pub use detect::{cmd_detect, cmd_info};
pub use extract::cmd_extract;
pub use list::cmd_list;
pub use modify::{cmd_add, cmd_remove, cmd_rename};

use std::error::Error;
use std::path::Path;

use retroarc_archive::registry::{ArchiveFormat, SuppData, detect as probe_formats, format_by_code};
use retroarc_core::archive::Archive;
use retroarc_core::stream::{FileStream, ReadStream, SeekFrom, shared};

/// Result type for CLI commands.
pub type CliResult = Result<(), Box<dyn Error>>;

/// Open an archive by path, auto-detecting the format unless one was
/// forced, and loading any supplementary files the format needs.
pub(crate) fn open_archive(
    path: &Path,
    format: Option<&str>,
) -> Result<(Box<dyn Archive>, &'static str), Box<dyn Error>> {
    // Fall back to read-only access; every operation except the
    // final flush works the same way.
    let mut file = match FileStream::open(path) {
        Ok(file) => file,
        Err(_) => FileStream::open_read(path)?,
    };

    let code: &'static str = match format {
        Some(requested) => {
            format_by_code(requested)
                .ok_or_else(|| format!("unknown format code {:?}", requested))?
                .code()
        }
        None => {
            let matches = probe_formats(&mut file)?;
            matches
                .first()
                .ok_or_else(|| format!("{}: not a recognised archive format", path.display()))?
                .0
        }
    };
    let fmt = format_by_code(code).expect("code came from the registry");

    file.seek(SeekFrom::Start(0))?;
    let content = shared(file);

    let mut supp = SuppData::new();
    for (item, supp_name) in fmt.required_supps(&path.to_string_lossy()) {
        let supp_file = FileStream::open(&supp_name)
            .map_err(|e| format!("cannot open supplementary file {}: {}", supp_name, e))?;
        supp.insert(item, shared(supp_file));
    }

    Ok((fmt.open(content, &mut supp)?, code))
}

/// Display name for an entry, inventing one for nameless formats.
pub(crate) fn entry_display_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("file{:03}", index)
    } else {
        name.to_string()
    }
}

/// Apply include/exclude glob patterns to an entry name.
pub(crate) fn matches_patterns(
    name: &str,
    include: &[glob::Pattern],
    exclude: &[glob::Pattern],
) -> bool {
    if !include.is_empty() && !include.iter().any(|p| p.matches(name)) {
        return false;
    }
    !exclude.iter().any(|p| p.matches(name))
}

/// Compile glob pattern strings.
pub(crate) fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, Box<dyn Error>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(Into::into))
        .collect()
}
