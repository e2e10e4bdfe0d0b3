//! `retroarc add` / `remove` / `rename` - mutate an archive in place.

use std::fs;
use std::path::{Path, PathBuf};

use retroarc_core::archive::Archive;
use retroarc_core::entry::{EntryAttrs, FILETYPE_GENERIC};
use retroarc_core::stream::{SeekFrom, Stream};

use super::{CliResult, open_archive};

pub fn cmd_add(
    path: &Path,
    format: Option<&str>,
    files: &[PathBuf],
    name: Option<&str>,
    before: Option<&str>,
) -> CliResult {
    if files.is_empty() {
        return Err("no files to add".into());
    }
    if name.is_some() && files.len() > 1 {
        return Err("--name only makes sense with a single file".into());
    }
    let (mut archive, _) = open_archive(path, format)?;

    let before_handle = match before {
        Some(target) => Some(
            archive
                .find(target)
                .ok_or_else(|| format!("no entry named {:?}", target))?,
        ),
        None => None,
    };

    for file in files {
        let data = fs::read(file)?;
        let store_as = match name {
            Some(n) => n.to_string(),
            None => file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let handle = archive.insert(
            before_handle.as_ref(),
            &store_as,
            data.len() as u64,
            FILETYPE_GENERIC,
            EntryAttrs::default(),
        )?;
        let mut stream = archive.open(&handle, true)?;
        stream.truncate(data.len() as u64)?;
        stream.seek(SeekFrom::Start(0))?;
        stream.write(&data)?;
        stream.flush()?;
        println!("added {}", handle.borrow().name);
    }
    archive.flush()?;
    Ok(())
}

pub fn cmd_remove(path: &Path, format: Option<&str>, names: &[String]) -> CliResult {
    if names.is_empty() {
        return Err("no entries to remove".into());
    }
    let (mut archive, _) = open_archive(path, format)?;
    for name in names {
        let handle = archive
            .find(name)
            .ok_or_else(|| format!("no entry named {:?}", name))?;
        archive.remove(&handle)?;
        println!("removed {}", name);
    }
    archive.flush()?;
    Ok(())
}

pub fn cmd_rename(path: &Path, format: Option<&str>, from: &str, to: &str) -> CliResult {
    let (mut archive, _) = open_archive(path, format)?;
    let handle = archive
        .find(from)
        .ok_or_else(|| format!("no entry named {:?}", from))?;
    archive.rename(&handle, to)?;
    archive.flush()?;
    println!("renamed {} to {}", from, handle.borrow().name);
    Ok(())
}
