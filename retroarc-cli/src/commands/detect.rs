//! `retroarc detect` / `info` - format probing and archive details.

use std::path::Path;

use retroarc_archive::registry::{ArchiveFormat, detect as probe_formats, format_by_code};
use retroarc_core::archive::{Archive, AttributeValue};
use retroarc_core::stream::FileStream;

use super::{CliResult, open_archive};

pub fn cmd_detect(path: &Path) -> CliResult {
    let mut file = FileStream::open_read(path)?;
    let matches = probe_formats(&mut file)?;
    if matches.is_empty() {
        println!("{}: no format matched", path.display());
        return Ok(());
    }
    for (code, certainty) in matches {
        let fmt = format_by_code(code).expect("code came from the registry");
        println!(
            "{:16} {:12} {}",
            code,
            format!("{:?}", certainty),
            fmt.friendly_name()
        );
    }
    Ok(())
}

pub fn cmd_info(path: &Path, format: Option<&str>) -> CliResult {
    let (archive, code) = open_archive(path, format)?;
    let fmt = format_by_code(code).expect("code came from the registry");

    println!("Archive: {}", path.display());
    println!("Format:  {} ({})", fmt.friendly_name(), code);
    println!("Games:   {}", fmt.games().join(", "));

    let caps = archive.caps();
    let mut notes = Vec::new();
    if !caps.filenames {
        notes.push("nameless entries".to_string());
    } else {
        notes.push(format!("names up to {} chars", caps.max_name_len));
    }
    if caps.folders {
        notes.push("folders".to_string());
    }
    if !caps.writable {
        notes.push("read-only".to_string());
    }
    if caps.fixed_count {
        notes.push("fixed slot count".to_string());
    }
    println!("Limits:  {}", notes.join(", "));

    let files = archive.files();
    let stored: u64 = files.iter().map(|h| h.borrow().stored_size).sum();
    let real: u64 = files.iter().map(|h| h.borrow().real_size).sum();
    println!(
        "Entries: {} ({} bytes stored, {} bytes unpacked)",
        files.len(),
        stored,
        real
    );

    for attr in archive.attributes() {
        let value = match &attr.value {
            AttributeValue::Int(v) => v.to_string(),
            AttributeValue::Enum(v) => v.to_string(),
            AttributeValue::Text(v) => format!("{:?}", v),
        };
        println!("Attr:    {} = {}", attr.name, value);
    }
    Ok(())
}
