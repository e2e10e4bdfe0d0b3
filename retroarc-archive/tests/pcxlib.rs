//! PCX Library end-to-end tests: 128-byte header, space-padded name
//! fields, bounded-text attribute.

use std::rc::Rc;

use retroarc_archive::registry::{ArchiveFormat, SuppData, format_by_code};
use retroarc_core::archive::{Archive, AttributeValue};
use retroarc_core::entry::{EntryAttrs, FILETYPE_GENERIC};
use retroarc_core::stream::{MemStream, ReadStream, SeekFrom, SharedStream, shared};

fn create_archive(content: &SharedStream) -> Box<dyn Archive> {
    let format = format_by_code("pcxlib").unwrap();
    let mut supp = SuppData::new();
    format.create(Rc::clone(content), &mut supp).unwrap()
}

fn reopen(content: &SharedStream) -> Box<dyn Archive> {
    let format = format_by_code("pcxlib").unwrap();
    let mut supp = SuppData::new();
    format.open(Rc::clone(content), &mut supp).unwrap()
}

fn bytes_of(content: &SharedStream) -> Vec<u8> {
    let mut c = content.borrow_mut();
    c.seek(SeekFrom::Start(0)).unwrap();
    c.read_to_end().unwrap()
}

#[test]
fn test_create_layout() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = create_archive(&content);
    archive.flush().unwrap();

    let raw = bytes_of(&content);
    assert_eq!(raw.len(), 128);
    assert_eq!(&raw[..2], &[0x01, 0xCA]);
    assert!(raw[2..].starts_with(b"Copyright (c) Genus Microprogramming, Inc. 1988-90"));
}

#[test]
fn test_insert_name_fields_space_padded() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = create_archive(&content);

    let h = archive
        .insert(None, "pic.pcx", 6, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    {
        use retroarc_core::stream::Stream;
        let mut f = archive.open(&h, true).unwrap();
        f.write(b"pixels").unwrap();
        f.flush().unwrap();
    }
    archive.flush().unwrap();

    let raw = bytes_of(&content);
    // Row at 128: sync byte, "PIC     ", ".PCX ".
    assert_eq!(raw[128], 0);
    assert_eq!(&raw[129..137], b"PIC     ");
    assert_eq!(&raw[137..142], b".PCX ");
    let offset = u32::from_le_bytes(raw[142..146].try_into().unwrap());
    assert_eq!(offset, 128 + 26);
    assert_eq!(&raw[154..], b"pixels");

    // And the name reads back joined.
    let reopened = reopen(&content);
    assert_eq!(reopened.files()[0].borrow().name, "PIC.PCX");
}

#[test]
fn test_description_attribute() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = create_archive(&content);

    let attrs = archive.attributes();
    assert_eq!(attrs.len(), 1);
    assert_eq!(attrs[0].name, "description");

    archive
        .set_attribute(0, AttributeValue::Text("My picture pack".into()))
        .unwrap();
    archive.flush().unwrap();

    let raw = bytes_of(&content);
    assert!(raw[2..].starts_with(b"My picture pack"));

    let reopened = reopen(&content);
    assert_eq!(
        reopened.attributes()[0].value,
        AttributeValue::Text("My picture pack".into())
    );

    // Over-long text is rejected with the archive untouched.
    let mut archive = reopen(&content);
    let long = "x".repeat(51);
    assert!(archive.set_attribute(0, AttributeValue::Text(long)).is_err());
}

#[test]
fn test_extension_length_enforced() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = create_archive(&content);
    assert!(
        archive
            .insert(None, "BAD.LONGX", 1, FILETYPE_GENERIC, EntryAttrs::default())
            .is_err()
    );
    assert!(archive.files().is_empty());
}

#[test]
fn test_is_instance_round_trip() {
    let content: SharedStream = shared(MemStream::new());
    let mut archive = create_archive(&content);
    archive
        .insert(None, "a.pcx", 4, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    archive
        .insert(None, "b.pcx", 4, FILETYPE_GENERIC, EntryAttrs::default())
        .unwrap();
    archive.flush().unwrap();

    let format = format_by_code("pcxlib").unwrap();
    let mut probe = MemStream::from_vec(bytes_of(&content));
    assert_eq!(
        format.is_instance(&mut probe).unwrap(),
        retroarc_archive::Certainty::DefinitelyYes
    );
}
