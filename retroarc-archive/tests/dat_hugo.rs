//! Hugo scenery .DAT end-to-end tests: nameless entries, FAT of
//! offset/size pairs, optional sibling-file FAT.

use std::rc::Rc;

use retroarc_archive::registry::{ArchiveFormat, SuppData, SuppItem, format_by_code};
use retroarc_core::archive::Archive;
use retroarc_core::entry::{EntryAttrs, FILETYPE_GENERIC};
use retroarc_core::stream::{MemStream, ReadStream, SeekFrom, SharedStream, Stream, shared};

fn fat_row(offset: u32, size: u32) -> Vec<u8> {
    let mut out = offset.to_le_bytes().to_vec();
    out.extend_from_slice(&size.to_le_bytes());
    out
}

fn content_12() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(fat_row(0x10, 0x0F));
    out.extend(fat_row(0x1F, 0x0F));
    out.extend_from_slice(b"This is one.dat");
    out.extend_from_slice(b"This is two.dat");
    out
}

fn open_sample(content: &SharedStream) -> Box<dyn Archive> {
    let format = format_by_code("dat-hugo").unwrap();
    let mut supp = SuppData::new();
    format.open(Rc::clone(content), &mut supp).unwrap()
}

fn bytes_of(content: &SharedStream) -> Vec<u8> {
    let mut c = content.borrow_mut();
    c.seek(SeekFrom::Start(0)).unwrap();
    c.read_to_end().unwrap()
}

#[test]
fn test_is_instance() {
    let format = format_by_code("dat-hugo").unwrap();
    let mut good = MemStream::from_vec(content_12());
    assert_eq!(
        format.is_instance(&mut good).unwrap(),
        retroarc_archive::Certainty::DefinitelyYes
    );
    // Empty could be an empty archive.
    let mut empty = MemStream::new();
    assert_eq!(
        format.is_instance(&mut empty).unwrap(),
        retroarc_archive::Certainty::PossiblyYes
    );
    // First file finishing past EOF cannot be right.
    let mut bad = MemStream::from_vec(fat_row(0x10, 0xFF));
    assert_eq!(
        format.is_instance(&mut bad).unwrap(),
        retroarc_archive::Certainty::DefinitelyNo
    );
}

#[test]
fn test_open_nameless() {
    let content = shared(MemStream::from_vec(content_12()));
    let mut archive = open_sample(&content);
    let files = archive.files();
    assert_eq!(files.len(), 2);
    assert!(files[0].borrow().name.is_empty());

    // Rename is meaningless in a nameless format.
    assert!(archive.rename(&files[0], "NAME.DAT").is_err());

    let mut f = archive.open(&files[0], true).unwrap();
    assert_eq!(f.read_to_end().unwrap(), b"This is one.dat");
}

#[test]
fn test_insert_at_end() {
    let content = shared(MemStream::from_vec(content_12()));
    let mut archive = open_sample(&content);

    let h = archive
        .insert(None, "", 17, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    let mut f = archive.open(&h, true).unwrap();
    f.write(b"This is three.dat").unwrap();
    f.flush().unwrap();
    drop(f);
    archive.flush().unwrap();

    let mut expect = Vec::new();
    expect.extend(fat_row(0x18, 0x0F));
    expect.extend(fat_row(0x27, 0x0F));
    expect.extend(fat_row(0x36, 0x11));
    expect.extend_from_slice(b"This is one.dat");
    expect.extend_from_slice(b"This is two.dat");
    expect.extend_from_slice(b"This is three.dat");
    assert_eq!(bytes_of(&content), expect);
}

#[test]
fn test_remove_first() {
    let content = shared(MemStream::from_vec(content_12()));
    let mut archive = open_sample(&content);

    let files = archive.files();
    archive.remove(&files[0]).unwrap();
    archive.flush().unwrap();

    let mut expect = Vec::new();
    expect.extend(fat_row(0x08, 0x0F));
    expect.extend_from_slice(b"This is two.dat");
    assert_eq!(bytes_of(&content), expect);
}

#[test]
fn test_zero_length_entries_share_offset() {
    let content = shared(MemStream::from_vec(content_12()));
    let mut archive = open_sample(&content);

    // Two empty entries at the end occupy the same offset.
    let a = archive
        .insert(None, "", 0, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    let b = archive
        .insert(None, "", 0, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    assert_eq!(a.borrow().offset, b.borrow().offset);

    // Growing the first pushes only the second.
    let off = a.borrow().offset;
    archive.resize(&a, 5, 5).unwrap();
    assert_eq!(a.borrow().offset, off);
    assert_eq!(b.borrow().offset, off + 5);

    // Growing the second leaves the first alone.
    archive.resize(&b, 3, 3).unwrap();
    assert_eq!(a.borrow().offset, off);
    assert_eq!(b.borrow().offset, off + 5);

    let mut f = archive.open(&a, true).unwrap();
    f.write(b"aaaaa").unwrap();
    f.flush().unwrap();
    drop(f);
    let mut f = archive.open(&b, true).unwrap();
    f.write(b"bbb").unwrap();
    f.flush().unwrap();
    drop(f);
    archive.flush().unwrap();

    let all = bytes_of(&content);
    assert!(all.ends_with(b"aaaaabbb"));
}

#[test]
fn test_supp_fat_selects_second_archive() {
    // scenery1.dat carries both directories: its own two files, then
    // scenery2.dat's one file (offsets drop back to the FAT end).
    let mut scenery1 = Vec::new();
    scenery1.extend(fat_row(0x18, 0x0F));
    scenery1.extend(fat_row(0x27, 0x0F));
    scenery1.extend(fat_row(0x08, 0x0F));
    scenery1.extend_from_slice(b"This is one.dat");
    scenery1.extend_from_slice(b"This is two.dat");

    let scenery2 = {
        let mut out = vec![0u8; 8];
        out.extend_from_slice(b"This is 2nd.dat");
        out
    };

    let format = format_by_code("dat-hugo").unwrap();
    let content: SharedStream = shared(MemStream::from_vec(scenery2));
    let mut supp = SuppData::new();
    supp.insert(SuppItem::Fat, shared(MemStream::from_vec(scenery1)));
    let mut archive = format.open(Rc::clone(&content), &mut supp).unwrap();

    let files = archive.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].borrow().offset, 0x08);
    let mut f = archive.open(&files[0], true).unwrap();
    assert_eq!(f.read_to_end().unwrap(), b"This is 2nd.dat");
}

#[test]
fn test_required_supps() {
    let format = format_by_code("dat-hugo").unwrap();
    let supps = format.required_supps("path/scenery2.dat");
    assert_eq!(supps.len(), 1);
    assert_eq!(supps[0].1, "path/scenery1.dat");
    assert!(format.required_supps("scenery1.dat").is_empty());
}
