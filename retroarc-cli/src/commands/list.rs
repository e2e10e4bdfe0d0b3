//! `retroarc list` - show archive contents.

use std::path::Path;

use serde_json::json;

use retroarc_core::archive::Archive;
use retroarc_core::entry::EntryAttrs;

use super::{CliResult, entry_display_name, open_archive};

pub fn cmd_list(path: &Path, format: Option<&str>, verbose: bool, as_json: bool) -> CliResult {
    let (archive, code) = open_archive(path, format)?;
    let files = archive.files();

    if as_json {
        let entries: Vec<_> = files
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let e = h.borrow();
                json!({
                    "name": entry_display_name(&e.name, i),
                    "stored_size": e.stored_size,
                    "real_size": e.real_size,
                    "offset": e.offset,
                    "type": e.filetype,
                    "filter": e.filter,
                    "compressed": e.attrs.contains(EntryAttrs::COMPRESSED),
                    "encrypted": e.attrs.contains(EntryAttrs::ENCRYPTED),
                    "folder": e.attrs.contains(EntryAttrs::FOLDER),
                })
            })
            .collect();
        let doc = json!({
            "archive": path.display().to_string(),
            "format": code,
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    if verbose {
        println!("{:>10} {:>10} {:>8}  {}", "Stored", "Real", "Offset", "Name");
    }
    let mut total_stored = 0u64;
    let mut total_real = 0u64;
    for (i, h) in files.iter().enumerate() {
        let e = h.borrow();
        total_stored += e.stored_size;
        total_real += e.real_size;
        let mut flags = String::new();
        if e.attrs.contains(EntryAttrs::COMPRESSED) {
            flags.push('c');
        }
        if e.attrs.contains(EntryAttrs::ENCRYPTED) {
            flags.push('e');
        }
        if e.attrs.contains(EntryAttrs::FOLDER) {
            flags.push('d');
        }
        if verbose {
            println!(
                "{:>10} {:>10} {:>8}  {} {}",
                e.stored_size,
                e.real_size,
                e.offset,
                entry_display_name(&e.name, i),
                flags,
            );
        } else {
            println!("{}", entry_display_name(&e.name, i));
        }
    }
    if verbose {
        println!(
            "{} entries, {} bytes stored, {} bytes unpacked",
            files.len(),
            total_stored,
            total_real
        );
    }
    Ok(())
}
