//! Raptor .GLB end-to-end tests: encrypted FAT maintained through a
//! decrypted working copy, per-file encryption flags.

use std::rc::Rc;

use retroarc_archive::registry::{ArchiveFormat, SuppData, format_by_code};
use retroarc_core::archive::Archive;
use retroarc_core::entry::{EntryAttrs, FILETYPE_GENERIC};
use retroarc_core::filter::run_filter;
use retroarc_core::stream::{MemStream, ReadStream, SeekFrom, SharedStream, Stream, shared};
use retroarc_filters::{GLB_FAT_BLOCK, GLB_KEY, GlbDecrypt};

fn bytes_of(content: &SharedStream) -> Vec<u8> {
    let mut c = content.borrow_mut();
    c.seek(SeekFrom::Start(0)).unwrap();
    c.read_to_end().unwrap()
}

fn build_archive(content: &SharedStream) -> Box<dyn Archive> {
    let format = format_by_code("glb-raptor").unwrap();
    let mut supp = SuppData::new();
    format.create(Rc::clone(content), &mut supp).unwrap()
}

fn reopen(content: &SharedStream) -> Box<dyn Archive> {
    let format = format_by_code("glb-raptor").unwrap();
    let mut supp = SuppData::new();
    format.open(Rc::clone(content), &mut supp).unwrap()
}

#[test]
fn test_create_writes_encrypted_empty_header() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = build_archive(&content);
    archive.flush().unwrap();

    let raw = bytes_of(&content);
    assert_eq!(raw.len(), 28);
    // Decrypting the header yields all zeroes (zero file count).
    let plain = run_filter(&mut GlbDecrypt::new(GLB_KEY, GLB_FAT_BLOCK), &raw, None).unwrap();
    assert_eq!(plain, vec![0u8; 28]);
}

#[test]
fn test_is_instance_accepts_created() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = build_archive(&content);
    archive.flush().unwrap();

    let format = format_by_code("glb-raptor").unwrap();
    let mut probe = MemStream::from_vec(bytes_of(&content));
    assert_eq!(
        format.is_instance(&mut probe).unwrap(),
        retroarc_archive::Certainty::DefinitelyYes
    );
}

#[test]
fn test_insert_flush_reopen_round_trip() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = build_archive(&content);

    let h = archive
        .insert(None, "palette.dat", 7, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    assert_eq!(h.borrow().name, "PALETTE.DAT");
    {
        let mut f = archive.open(&h, true).unwrap();
        f.write(b"raw pal").unwrap();
        f.flush().unwrap();
    }

    let h2 = archive
        .insert(None, "level.map", 9, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    {
        let mut f = archive.open(&h2, true).unwrap();
        f.write(b"level map").unwrap();
        f.flush().unwrap();
    }
    archive.flush().unwrap();

    // The FAT on disk is ciphertext: no plaintext name visible.
    let raw = bytes_of(&content);
    assert_eq!(raw.len() as u64, 28 + 2 * 28 + 7 + 9);
    let window = &raw[..28 * 3];
    assert!(
        !window
            .windows(7)
            .any(|w| w == b"PALETTE"),
        "FAT appears to be unencrypted"
    );
    // Payloads of unencrypted entries are stored raw.
    assert_eq!(&raw[28 * 3..28 * 3 + 7], b"raw pal");

    let mut reopened = reopen(&content);
    let files = reopened.files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].borrow().name, "PALETTE.DAT");
    assert_eq!(files[1].borrow().name, "LEVEL.MAP");
    let mut f = reopened.open(&files[1], true).unwrap();
    assert_eq!(f.read_to_end().unwrap(), b"level map");
}

#[test]
fn test_encrypted_entry_round_trip() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = build_archive(&content);

    let h = archive
        .insert(None, "secret.dat", 11, FILETYPE_GENERIC, EntryAttrs::ENCRYPTED)
        .unwrap();
    assert_eq!(h.borrow().filter, "glb-raptor");
    {
        let mut f = archive.open(&h, true).unwrap();
        f.write(b"top secrets").unwrap();
        f.flush().unwrap();
    }
    archive.flush().unwrap();

    // Stored bytes differ from the plaintext.
    let raw = bytes_of(&content);
    let body = &raw[raw.len() - 11..];
    assert_ne!(body, b"top secrets");

    // And reopening decrypts through the entry's filter.
    let mut reopened = reopen(&content);
    let files = reopened.files();
    assert!(files[0].borrow().attrs.contains(EntryAttrs::ENCRYPTED));
    let mut f = reopened.open(&files[0], true).unwrap();
    assert_eq!(f.read_to_end().unwrap(), b"top secrets");
}

#[test]
fn test_remove_and_rename_survive_reencryption() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = build_archive(&content);

    for (name, data) in [
        ("a.dat", b"AAAA".as_slice()),
        ("b.dat", b"BBBBB"),
        ("c.dat", b"CCCCCC"),
    ] {
        let h = archive
            .insert(
                None,
                name,
                data.len() as u64,
                FILETYPE_GENERIC,
                EntryAttrs::default(),
            )
            .unwrap();
        let mut f = archive.open(&h, true).unwrap();
        f.write(data).unwrap();
        f.flush().unwrap();
    }
    archive.flush().unwrap();

    let mut archive = reopen(&content);
    let b = archive.find("B.DAT").unwrap();
    archive.remove(&b).unwrap();
    let a = archive.find("A.DAT").unwrap();
    archive.rename(&a, "Z.DAT").unwrap();
    archive.flush().unwrap();

    let mut reopened = reopen(&content);
    let names: Vec<String> = reopened
        .files()
        .iter()
        .map(|h| h.borrow().name.clone())
        .collect();
    assert_eq!(names, ["Z.DAT", "C.DAT"]);
    let c = reopened.find("C.DAT").unwrap();
    let mut f = reopened.open(&c, true).unwrap();
    assert_eq!(f.read_to_end().unwrap(), b"CCCCCC");
}
