//! Fixed-slot archive engine.
//!
//! Some games keep their assets at hard-coded offsets inside the game
//! executable. A [`FixedArchive`] presents those slots through the
//! same [`Archive`] interface as a real container: entries can be
//! opened and their bytes edited in place, but nothing can be
//! inserted, removed, renamed or reordered. A slot may carry a
//! per-entry resize callback when the surrounding bytes record a
//! decompressed size that must be kept up to date.

use std::cell::RefCell;
use std::rc::Rc;

use retroarc_core::archive::Archive;
use retroarc_core::entry::{Caps, Entry, EntryAttrs, FILETYPE_GENERIC, FileHandle, new_handle};
use retroarc_core::error::{Error, Result};
use retroarc_core::filtered::{FilteredStream, SizeCallback};
use retroarc_core::stream::{SharedStream, Stream};
use retroarc_core::sub::SubStream;
use retroarc_filters::FilterType as _;

/// Resize hook for one fixed slot.
///
/// Called once at open time with `None` sizes so the hook can fill in
/// the entry's real (decompressed) size from surrounding bytes, and
/// again on every resize with the new sizes to validate the fit and
/// update those bytes.
pub type FixedResize = fn(
    io: &mut dyn Stream,
    file: &FixedFile,
    entry: &mut Entry,
    new_sizes: Option<(u64, u64)>,
) -> Result<()>;

/// One pre-declared slot in a fixed archive.
#[derive(Debug, Clone)]
pub struct FixedFile {
    /// Byte position of the slot in the backing stream.
    pub offset: u64,
    /// Slot length in bytes.
    pub size: u64,
    /// Entry name exposed to the caller.
    pub name: &'static str,
    /// Filter code, or empty for raw slots.
    pub filter: &'static str,
    /// Optional resize hook.
    pub resize: Option<FixedResize>,
}

struct FixedInner {
    content: SharedStream,
    files: Vec<FixedFile>,
    entries: Vec<FileHandle>,
}

/// An archive whose entries are fixed slots in a host file.
pub struct FixedArchive {
    inner: Rc<RefCell<FixedInner>>,
}

impl FixedArchive {
    /// Build an archive over `content` from a slot table.
    pub fn new(content: SharedStream, files: Vec<FixedFile>) -> Result<Self> {
        let mut entries = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let mut entry = Entry {
                name: file.name.to_string(),
                filetype: FILETYPE_GENERIC.to_string(),
                stored_size: file.size,
                real_size: file.size,
                offset: file.offset,
                header_len: 0,
                attrs: if file.filter.is_empty() {
                    EntryAttrs::default()
                } else {
                    EntryAttrs::COMPRESSED
                },
                filter: file.filter.to_string(),
                valid: true,
                index,
                extra: Vec::new(),
            };
            if let Some(resize) = file.resize {
                let mut io = content.borrow_mut();
                resize(&mut *io, file, &mut entry, None)?;
            }
            entries.push(new_handle(entry));
        }
        Ok(Self {
            inner: Rc::new(RefCell::new(FixedInner {
                content,
                files,
                entries,
            })),
        })
    }
}

impl FixedInner {
    fn position_of(&self, handle: &FileHandle) -> Result<usize> {
        self.entries
            .iter()
            .position(|h| Rc::ptr_eq(h, handle))
            .ok_or_else(|| Error::invalid_argument("handle is not a member of this archive"))
    }

    fn resize_impl(&mut self, handle: &FileHandle, new_stored: u64, new_real: u64) -> Result<()> {
        let idx = self.position_of(handle)?;
        let file = self.files[idx].clone();
        match file.resize {
            Some(resize) => {
                let mut io = self.content.borrow_mut();
                resize(&mut *io, &file, &mut handle.borrow_mut(), Some((new_stored, new_real)))
            }
            None => {
                if handle.borrow().stored_size == new_stored {
                    Ok(())
                } else {
                    Err(Error::invalid_operation(format!(
                        "this is a fixed archive; the slot must remain {} bytes",
                        handle.borrow().stored_size
                    )))
                }
            }
        }
    }
}

fn refuse<T>() -> Result<T> {
    Err(Error::invalid_operation(
        "this is a fixed archive; its slots cannot be restructured",
    ))
}

impl Archive for FixedArchive {
    fn caps(&self) -> Caps {
        Caps {
            filenames: true,
            max_name_len: 12,
            folders: false,
            case_sensitive: false,
            writable: true,
            fixed_count: true,
        }
    }

    fn files(&self) -> Vec<FileHandle> {
        self.inner.borrow().entries.iter().map(Rc::clone).collect()
    }

    fn is_valid(&self, handle: &FileHandle) -> bool {
        self.inner.borrow().position_of(handle).is_ok()
    }

    fn open(&mut self, handle: &FileHandle, apply_filter: bool) -> Result<Box<dyn Stream>> {
        let sub;
        let filter_code;
        let real_size;
        {
            let inner = self.inner.borrow();
            inner.position_of(handle)?;
            let e = handle.borrow();
            sub = SubStream::new(Rc::clone(&inner.content), e.offset, e.stored_size);
            filter_code = e.filter.clone();
            real_size = e.real_size;
        }

        if !apply_filter || filter_code.is_empty() {
            return Ok(Box::new(sub));
        }

        let filter_type = retroarc_filters::filter_by_code(&filter_code).ok_or_else(|| {
            Error::unsupported(format!("no filter registered for code {:?}", filter_code))
        })?;
        let mut decoder = filter_type.decoder();
        let encoder = filter_type.encoder();

        let weak_inner = Rc::downgrade(&self.inner);
        let cb_handle = Rc::clone(handle);
        let resize: SizeCallback = Box::new(move |stored, real| {
            let inner = weak_inner
                .upgrade()
                .ok_or_else(|| Error::invalid_operation("archive has been closed"))?;
            inner
                .borrow_mut()
                .resize_impl(&cb_handle, stored, real)
        });

        let filtered = FilteredStream::open(
            Box::new(sub),
            decoder.as_mut(),
            Some(encoder),
            Some(real_size),
            Some(resize),
        )?;
        Ok(Box::new(filtered))
    }

    fn insert(
        &mut self,
        _before: Option<&FileHandle>,
        _name: &str,
        _stored_size: u64,
        _filetype: &str,
        _attrs: EntryAttrs,
    ) -> Result<FileHandle> {
        refuse()
    }

    fn remove(&mut self, _handle: &FileHandle) -> Result<()> {
        refuse()
    }

    fn rename(&mut self, _handle: &FileHandle, _new_name: &str) -> Result<()> {
        refuse()
    }

    fn move_file(&mut self, _handle: &FileHandle, _before: Option<&FileHandle>) -> Result<()> {
        refuse()
    }

    fn resize(&mut self, handle: &FileHandle, new_stored: u64, new_real: u64) -> Result<()> {
        self.inner
            .borrow_mut()
            .resize_impl(handle, new_stored, new_real)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.borrow().content.borrow_mut().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroarc_core::stream::{MemStream, ReadStream, SeekFrom, shared};

    fn sample() -> FixedArchive {
        let content = shared(MemStream::from_vec(b"AAAABBBBBBBBCC".to_vec()));
        FixedArchive::new(
            content,
            vec![
                FixedFile {
                    offset: 0,
                    size: 4,
                    name: "first.bin",
                    filter: "",
                    resize: None,
                },
                FixedFile {
                    offset: 4,
                    size: 8,
                    name: "second.bin",
                    filter: "",
                    resize: None,
                },
                FixedFile {
                    offset: 12,
                    size: 2,
                    name: "third.bin",
                    filter: "",
                    resize: None,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_open_slots() {
        let mut arch = sample();
        let files = arch.files();
        assert_eq!(files.len(), 3);

        let h = arch.find("SECOND.BIN").expect("case-insensitive find");
        let mut s = arch.open(&h, true).unwrap();
        assert_eq!(s.read_to_end().unwrap(), b"BBBBBBBB");
    }

    #[test]
    fn test_edit_in_place() {
        let mut arch = sample();
        let h = arch.find("first.bin").unwrap();
        let mut s = arch.open(&h, true).unwrap();
        s.write(b"XYZW").unwrap();
        s.flush().unwrap();

        let mut s = arch.open(&h, true).unwrap();
        assert_eq!(s.read_to_end().unwrap(), b"XYZW");
    }

    #[test]
    fn test_structural_ops_refused() {
        let mut arch = sample();
        let h = arch.find("first.bin").unwrap();
        assert!(arch.insert(None, "new.bin", 4, "", EntryAttrs::default()).is_err());
        assert!(arch.remove(&h).is_err());
        assert!(arch.rename(&h, "other.bin").is_err());
        assert!(arch.move_file(&h, None).is_err());
    }

    #[test]
    fn test_resize_without_hook_refused() {
        let mut arch = sample();
        let h = arch.find("third.bin").unwrap();
        assert!(arch.resize(&h, 5, 5).is_err());
        // Same size is a no-op, not an error.
        assert!(arch.resize(&h, 2, 2).is_ok());
    }

    #[test]
    fn test_resize_hook_updates_prefix() {
        // Slot at offset 4 with a u32le decompressed-size prefix at
        // offset 0, the Dangerous Dave tileset arrangement.
        fn hook(
            io: &mut dyn Stream,
            file: &FixedFile,
            entry: &mut Entry,
            new_sizes: Option<(u64, u64)>,
        ) -> Result<()> {
            match new_sizes {
                None => {
                    io.seek(SeekFrom::Start(file.offset - 4))?;
                    entry.real_size = io.read_u32_le()? as u64;
                    Ok(())
                }
                Some((stored, real)) => {
                    if stored > file.size {
                        return Err(Error::invalid_argument("slot overflow"));
                    }
                    io.seek(SeekFrom::Start(file.offset - 4))?;
                    io.write_u32_le(real as u32)?;
                    entry.real_size = real;
                    Ok(())
                }
            }
        }

        let content = shared(MemStream::from_vec(
            [9u8, 0, 0, 0, b'd', b'a', b't', b'a'].to_vec(),
        ));
        let mut arch = FixedArchive::new(
            content,
            vec![FixedFile {
                offset: 4,
                size: 4,
                name: "blob.bin",
                filter: "",
                resize: Some(hook),
            }],
        )
        .unwrap();

        let h = arch.find("blob.bin").unwrap();
        assert_eq!(h.borrow().real_size, 9);

        arch.resize(&h, 4, 17).unwrap();
        assert_eq!(h.borrow().real_size, 17);
        assert!(arch.resize(&h, 99, 99).is_err());
    }
}
