//! Stellar 7 .RES end-to-end tests: inline headers, folder entries
//! opened as nested archives.

use std::rc::Rc;

use retroarc_archive::registry::{ArchiveFormat, SuppData, format_by_code};
use retroarc_core::archive::Archive;
use retroarc_core::entry::{EntryAttrs, FILETYPE_GENERIC};
use retroarc_core::stream::{MemStream, ReadStream, SharedStream, Stream, shared};

fn block(name: &str, size_field: u32, content: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 4];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&size_field.to_le_bytes());
    out.extend_from_slice(content);
    out
}

/// Two plain files plus a folder holding one nested file.
fn sample() -> Vec<u8> {
    let nested = block("SUB", 15, b"This is sub.dat");
    let mut out = Vec::new();
    out.extend(block("ONE", 15, b"This is one.dat"));
    out.extend(block(
        "FLDR",
        nested.len() as u32 | 0x8000_0000,
        &nested,
    ));
    out.extend(block("TWO", 15, b"This is two.dat"));
    out
}

fn open_sample(content: &SharedStream) -> Box<dyn Archive> {
    let format = format_by_code("res-stellar7").unwrap();
    let mut supp = SuppData::new();
    format.open(Rc::clone(content), &mut supp).unwrap()
}

#[test]
fn test_parse_marks_folders() {
    let content = shared(MemStream::from_vec(sample()));
    let archive = open_sample(&content);
    let files = archive.files();
    assert_eq!(files.len(), 3);
    assert!(!files[0].borrow().attrs.contains(EntryAttrs::FOLDER));
    assert!(files[1].borrow().attrs.contains(EntryAttrs::FOLDER));
    assert_eq!(files[1].borrow().name, "FLDR");
}

#[test]
fn test_open_folder_as_archive() {
    let content = shared(MemStream::from_vec(sample()));
    let mut archive = open_sample(&content);

    let folder = archive.find("FLDR").unwrap();
    let mut nested = archive.open_folder(&folder).unwrap();
    let entries = nested.files();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].borrow().name, "SUB");

    let mut f = nested.open(&entries[0], true).unwrap();
    assert_eq!(f.read_to_end().unwrap(), b"This is sub.dat");

    // Plain files refuse to open as folders.
    let one = archive.find("ONE").unwrap();
    assert!(archive.open_folder(&one).is_err());
}

#[test]
fn test_insert_and_mutate() {
    let content = shared(MemStream::from_vec(sample()));
    let mut archive = open_sample(&content);

    let two = archive.find("TWO").unwrap();
    let h = archive
        .insert(Some(&two), "NEW", 9, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    {
        let mut f = archive.open(&h, true).unwrap();
        f.write(b"some data").unwrap();
        f.flush().unwrap();
    }
    archive.flush().unwrap();

    let mut reopened = open_sample(&content);
    let names: Vec<String> = reopened
        .files()
        .iter()
        .map(|h| h.borrow().name.clone())
        .collect();
    assert_eq!(names, ["ONE", "FLDR", "NEW", "TWO"]);

    // Folder contents survived the shuffle.
    let folder = reopened.find("FLDR").unwrap();
    let mut nested = reopened.open_folder(&folder).unwrap();
    let entries = nested.files();
    let mut f = nested.open(&entries[0], true).unwrap();
    assert_eq!(f.read_to_end().unwrap(), b"This is sub.dat");
}

#[test]
fn test_four_char_name_limit() {
    let content = shared(MemStream::from_vec(sample()));
    let mut archive = open_sample(&content);
    let one = archive.find("ONE").unwrap();
    assert!(archive.rename(&one, "TOOBIG").is_err());
    archive.rename(&one, "NEO").unwrap();
    assert!(archive.find("NEO").is_some());
}
