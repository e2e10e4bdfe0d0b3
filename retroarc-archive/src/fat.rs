//! Generic mutable FAT archive engine.
//!
//! Nearly every supported game stores a directory of (name, offset,
//! size) rows somewhere in its data file. The row layouts differ; the
//! byte gymnastics of editing do not. This engine owns the gymnastics
//! - reserving and reclaiming payload space, keeping every directory
//! offset and every open sub-stream consistent across edits - and a
//! small per-format [`FatLayout`] supplies the row reading and
//! writing.
//!
//! All edits go through a [`SegStream`] layered over the backing
//! stream, so nothing is physically rewritten until [`flush`].
//!
//! A single operation updates many entry offsets and many directory
//! rows. The engine does each in one pass, after the layout hook has
//! reported what the directory did, so per-entry hook work always
//! observes a consistent delta rather than a half-edited archive.
//!
//! [`flush`]: FatArchive::flush

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use retroarc_core::archive::{Archive, Attribute, AttributeValue};
use retroarc_core::entry::{Caps, Entry, EntryAttrs, FileHandle, new_handle};
use retroarc_core::error::{Error, Result};
use retroarc_core::filtered::{FilteredStream, SizeCallback};
use retroarc_core::segment::SegStream;
use retroarc_core::stream::{ReadStream, SeekFrom, SharedStream, Stream};
use retroarc_core::sub::SubStream;
use retroarc_filters::FilterType as _;

/// Shared handle to the engine's segmented stream.
pub type SharedSeg = Rc<RefCell<SegStream>>;

/// How a layout hook moved the directory region: every entry whose
/// payload starts at or after `at` shifted by `delta` bytes.
#[derive(Debug, Clone, Copy)]
pub struct DirShift {
    /// First affected byte position in the backing stream.
    pub at: u64,
    /// Signed byte distance the region moved.
    pub delta: i64,
}

/// Per-format directory layout, plugged into [`FatArchive`].
///
/// Hooks write into the same segmented stream the engine edits, so
/// directory and payload changes materialise together at flush.
pub trait FatLayout {
    /// Reserve directory space for `new_entry` and write its row.
    /// `count` is the number of entries before the insert; the new
    /// entry's `index` field is already final. The hook must set
    /// `header_len` (for inline-header formats), adjust
    /// `new_entry.offset` for any directory bytes it inserted ahead
    /// of the payload region, and report that insertion as a
    /// [`DirShift`] so the engine can move the existing entries.
    fn pre_insert(
        &mut self,
        io: &mut SegStream,
        count: usize,
        new_entry: &mut Entry,
    ) -> Result<Option<DirShift>>;

    /// Called after the entry is fully inserted; update header
    /// counters here. `count` is the new entry total.
    fn post_insert(&mut self, _io: &mut SegStream, _count: usize) -> Result<()> {
        Ok(())
    }

    /// Report how the directory will shrink when `entry` goes away,
    /// without touching anything yet. The engine rewrites the
    /// affected offsets while every row is still in place, then calls
    /// [`remove_dir_entry`](FatLayout::remove_dir_entry).
    fn pre_remove(
        &mut self,
        _io: &mut SegStream,
        _count: usize,
        _entry: &Entry,
    ) -> Result<Option<DirShift>> {
        Ok(None)
    }

    /// Physically remove `entry`'s directory row.
    fn remove_dir_entry(&mut self, _io: &mut SegStream, _entry: &Entry) -> Result<()> {
        Ok(())
    }

    /// Called after the entry is gone; update header counters here.
    fn post_remove(&mut self, _io: &mut SegStream, _count: usize) -> Result<()> {
        Ok(())
    }

    /// Write `entry`'s (already updated) name into its row.
    fn update_name(&mut self, _io: &mut SegStream, _entry: &Entry) -> Result<()> {
        Err(Error::invalid_operation(
            "this archive format has no filenames",
        ))
    }

    /// Write `entry`'s current offset into its row. Formats that do
    /// not store offsets leave this as the no-op default.
    fn update_offset(&mut self, _io: &mut SegStream, _entry: &Entry) -> Result<()> {
        Ok(())
    }

    /// Write `entry`'s current sizes into its row.
    fn update_size(&mut self, _io: &mut SegStream, _entry: &Entry) -> Result<()> {
        Ok(())
    }

    /// Format attributes with current values.
    fn attributes(&self) -> Vec<Attribute> {
        Vec::new()
    }

    /// Update a format attribute, reporting any header resize.
    fn set_attribute(
        &mut self,
        _io: &mut SegStream,
        _index: usize,
        _value: AttributeValue,
    ) -> Result<Option<DirShift>> {
        Err(Error::invalid_operation(
            "this archive format has no attributes",
        ))
    }

    /// Open a folder entry's payload as a nested archive.
    fn open_folder(&self, _contents: SharedStream) -> Result<Box<dyn Archive>> {
        Err(Error::invalid_operation(
            "this archive format has no folders",
        ))
    }

    /// Last chance to write into the backing stream before commit
    /// (re-encrypt a FAT copy, flush a supplementary stream).
    fn flush(&mut self, _io: &mut SegStream) -> Result<()> {
        Ok(())
    }
}

struct OpenFile {
    stream: Weak<RefCell<SubStream>>,
    entry: FileHandle,
}

struct FatInner {
    io: SharedSeg,
    entries: Vec<FileHandle>,
    open_files: Vec<OpenFile>,
    layout: Box<dyn FatLayout>,
    first_file_offset: u64,
    caps: Caps,
    poisoned: bool,
}

/// A mutable FAT-backed archive.
pub struct FatArchive {
    inner: Rc<RefCell<FatInner>>,
}

impl FatArchive {
    /// Assemble an engine from a parsed directory. `entries` must be
    /// in stored order; their `index` fields are assigned here.
    pub fn new(
        io: SharedSeg,
        layout: Box<dyn FatLayout>,
        first_file_offset: u64,
        caps: Caps,
        entries: Vec<Entry>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(i, mut e)| {
                e.index = i;
                e.valid = true;
                new_handle(e)
            })
            .collect();
        Self {
            inner: Rc::new(RefCell::new(FatInner {
                io,
                entries,
                open_files: Vec::new(),
                layout,
                first_file_offset,
                caps,
                poisoned: false,
            })),
        }
    }
}

impl FatInner {
    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            Err(Error::io(
                0,
                std::io::Error::other("archive poisoned by an earlier failed flush"),
            ))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<()> {
        if !self.caps.writable {
            return Err(Error::invalid_operation("this archive is read-only"));
        }
        Ok(())
    }

    fn position_of(&self, handle: &FileHandle) -> Result<usize> {
        self.entries
            .iter()
            .position(|h| Rc::ptr_eq(h, handle))
            .ok_or_else(|| Error::invalid_argument("handle is not a member of this archive"))
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if !self.caps.filenames {
            return Ok(());
        }
        if name.len() > self.caps.max_name_len {
            return Err(Error::invalid_argument(format!(
                "filename {:?} is longer than this format's limit of {} characters",
                name, self.caps.max_name_len
            )));
        }
        if name.bytes().any(|b| b < 0x20 || b == 0x7F) {
            return Err(Error::invalid_argument(
                "filename contains control characters",
            ));
        }
        Ok(())
    }

    /// Drop dead weak references so the registry stays small.
    fn prune_open_files(&mut self) {
        self.open_files.retain(|of| of.stream.upgrade().is_some());
    }

    /// Relocate every live sub-stream bound to `entry` by `delta`.
    fn relocate_streams(&mut self, entry: &FileHandle, delta: i64) {
        for of in &self.open_files {
            if Rc::ptr_eq(&of.entry, entry) {
                if let Some(sub) = of.stream.upgrade() {
                    sub.borrow_mut().relocate(delta);
                }
            }
        }
    }

    /// Resize every live sub-stream bound to `entry`.
    fn resize_streams(&mut self, entry: &FileHandle, len: u64) {
        for of in &self.open_files {
            if Rc::ptr_eq(&of.entry, entry) {
                if let Some(sub) = of.stream.upgrade() {
                    sub.borrow_mut().resize(len);
                }
            }
        }
    }

    /// Mark every live sub-stream bound to `entry` dead.
    fn invalidate_streams(&mut self, entry: &FileHandle) {
        for of in &self.open_files {
            if Rc::ptr_eq(&of.entry, entry) {
                if let Some(sub) = of.stream.upgrade() {
                    sub.borrow_mut().invalidate();
                }
            }
        }
        self.open_files
            .retain(|of| !Rc::ptr_eq(&of.entry, entry));
    }

    /// Apply a directory shift reported by a layout hook: move the
    /// offset of every member entry at or past `shift.at`, rewrite
    /// its row, and keep its open streams aligned. One pass, in
    /// stored order.
    fn apply_dir_shift(&mut self, shift: DirShift) -> Result<()> {
        if shift.delta == 0 {
            return Ok(());
        }
        let io = Rc::clone(&self.io);
        let affected: Vec<FileHandle> = self
            .entries
            .iter()
            .filter(|h| h.borrow().offset >= shift.at)
            .map(Rc::clone)
            .collect();
        for handle in affected {
            {
                let mut e = handle.borrow_mut();
                e.offset = e.offset.wrapping_add_signed(shift.delta);
            }
            {
                let mut io = io.borrow_mut();
                self.layout.update_offset(&mut io, &handle.borrow())?;
            }
            self.relocate_streams(&handle, shift.delta);
        }
        Ok(())
    }

    /// Shift every entry from vector position `start` onward by
    /// `delta` payload bytes. Uses vector order, not offset order, so
    /// zero-length neighbours sharing an offset stay put when they
    /// sort before the edited entry.
    fn shift_from_index(&mut self, start: usize, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let io = Rc::clone(&self.io);
        let affected: Vec<FileHandle> =
            self.entries[start..].iter().map(Rc::clone).collect();
        for handle in affected {
            {
                let mut e = handle.borrow_mut();
                e.offset = e.offset.wrapping_add_signed(delta);
            }
            {
                let mut io = io.borrow_mut();
                self.layout.update_offset(&mut io, &handle.borrow())?;
            }
            self.relocate_streams(&handle, delta);
        }
        Ok(())
    }

    fn insert_impl(
        &mut self,
        before: Option<&FileHandle>,
        name: &str,
        stored_size: u64,
        filetype: &str,
        attrs: EntryAttrs,
    ) -> Result<FileHandle> {
        self.check_poisoned()?;
        self.check_writable()?;
        if self.caps.fixed_count {
            return Err(Error::invalid_operation(
                "this archive has a fixed number of entries",
            ));
        }
        self.check_name(name)?;
        self.prune_open_files();

        let idx = match before {
            Some(handle) => self.position_of(handle)?,
            None => self.entries.len(),
        };
        let offset = if idx < self.entries.len() {
            self.entries[idx].borrow().offset
        } else if let Some(last) = self.entries.last() {
            let e = last.borrow();
            (e.offset + e.header_len + e.stored_size).max(self.first_file_offset)
        } else {
            self.first_file_offset
        };

        // Rows after the insertion point move down one slot; their
        // indices must be final before any hook writes rows by index.
        for handle in &self.entries[idx..] {
            handle.borrow_mut().index += 1;
        }

        let mut new_entry = Entry {
            name: name.to_string(),
            filetype: filetype.to_string(),
            stored_size,
            real_size: stored_size,
            offset,
            header_len: 0,
            attrs,
            filter: String::new(),
            valid: true,
            index: idx,
            extra: Vec::new(),
        };

        let io = Rc::clone(&self.io);
        let count = self.entries.len();
        let shift = {
            let mut io = io.borrow_mut();
            self.layout.pre_insert(&mut io, count, &mut new_entry)
        };
        let shift = match shift {
            Ok(s) => s,
            Err(e) => {
                // Roll the index bump back; nothing else happened yet.
                for handle in &self.entries[idx..] {
                    handle.borrow_mut().index -= 1;
                }
                return Err(e);
            }
        };
        if let Some(shift) = shift {
            self.apply_dir_shift(shift)?;
        }

        // Reserve the payload slot.
        io.borrow_mut()
            .insert(new_entry.offset + new_entry.header_len, stored_size)?;
        self.shift_from_index(idx, stored_size as i64)?;

        let handle = new_handle(new_entry);
        self.entries.insert(idx, Rc::clone(&handle));

        {
            let mut io = io.borrow_mut();
            let count = self.entries.len();
            self.layout.post_insert(&mut io, count)?;
        }
        Ok(handle)
    }

    fn remove_impl(&mut self, handle: &FileHandle) -> Result<()> {
        self.check_poisoned()?;
        self.check_writable()?;
        if self.caps.fixed_count {
            return Err(Error::invalid_operation(
                "this archive has a fixed number of entries",
            ));
        }
        let idx = self.position_of(handle)?;
        self.prune_open_files();

        let io = Rc::clone(&self.io);
        let count = self.entries.len();
        let shift = {
            let mut io = io.borrow_mut();
            let entry = handle.borrow();
            self.layout.pre_remove(&mut io, count, &entry)?
        };
        // Rewrite offsets while every row still exists, then drop the
        // row itself.
        if let Some(shift) = shift {
            self.apply_dir_shift(shift)?;
        }
        {
            let mut io = io.borrow_mut();
            let entry = handle.borrow();
            self.layout.remove_dir_entry(&mut io, &entry)?;
        }

        for h in &self.entries[idx + 1..] {
            h.borrow_mut().index -= 1;
        }

        let (offset, span) = {
            let e = handle.borrow();
            (e.offset, e.header_len + e.stored_size)
        };
        io.borrow_mut().remove(offset, span)?;
        self.shift_from_index(idx + 1, -(span as i64))?;

        self.entries.remove(idx);
        handle.borrow_mut().valid = false;
        self.invalidate_streams(handle);

        {
            let mut io = io.borrow_mut();
            let count = self.entries.len();
            self.layout.post_remove(&mut io, count)?;
        }
        Ok(())
    }

    fn resize_impl(&mut self, handle: &FileHandle, new_stored: u64, new_real: u64) -> Result<()> {
        self.check_poisoned()?;
        self.check_writable()?;
        let idx = self.position_of(handle)?;
        self.prune_open_files();

        let io = Rc::clone(&self.io);
        let (old_stored, edit_point) = {
            let e = handle.borrow();
            (e.stored_size, e.offset + e.header_len)
        };
        let delta = new_stored as i64 - old_stored as i64;
        if delta > 0 {
            io.borrow_mut()
                .insert(edit_point + old_stored, delta as u64)?;
        } else if delta < 0 {
            io.borrow_mut()
                .remove(edit_point + new_stored, (-delta) as u64)?;
        }
        {
            let mut e = handle.borrow_mut();
            e.stored_size = new_stored;
            e.real_size = new_real;
        }
        {
            let mut io = io.borrow_mut();
            self.layout.update_size(&mut io, &handle.borrow())?;
        }
        self.shift_from_index(idx + 1, delta)?;
        self.resize_streams(handle, new_stored);
        Ok(())
    }

    fn rename_impl(&mut self, handle: &FileHandle, new_name: &str) -> Result<()> {
        self.check_poisoned()?;
        self.check_writable()?;
        self.position_of(handle)?;
        if !self.caps.filenames {
            return Err(Error::invalid_operation(
                "this archive format has no filenames",
            ));
        }
        self.check_name(new_name)?;

        let io = Rc::clone(&self.io);
        let old_name = std::mem::replace(&mut handle.borrow_mut().name, new_name.to_string());
        let result = {
            let mut io = io.borrow_mut();
            self.layout.update_name(&mut io, &handle.borrow())
        };
        if result.is_err() {
            handle.borrow_mut().name = old_name;
        }
        result
    }

    fn flush_impl(&mut self) -> Result<()> {
        self.check_poisoned()?;
        let io = Rc::clone(&self.io);
        let result = (|| {
            {
                let mut io = io.borrow_mut();
                self.layout.flush(&mut io)?;
            }
            io.borrow_mut().commit()
        })();
        if result.is_err() {
            // The backing stream may be partially updated; refuse
            // further work on this handle.
            self.poisoned = true;
        }
        result
    }
}

/// Resize an entry through the shared inner state; used both by the
/// public `resize` and by filtered streams reporting their final
/// encoded size at flush time.
fn resize_shared(
    inner: &Rc<RefCell<FatInner>>,
    handle: &FileHandle,
    new_stored: u64,
    new_real: u64,
) -> Result<()> {
    inner
        .borrow_mut()
        .resize_impl(handle, new_stored, new_real)
}

impl Archive for FatArchive {
    fn caps(&self) -> Caps {
        self.inner.borrow().caps
    }

    fn files(&self) -> Vec<FileHandle> {
        self.inner.borrow().entries.iter().map(Rc::clone).collect()
    }

    fn is_valid(&self, handle: &FileHandle) -> bool {
        let inner = self.inner.borrow();
        inner.position_of(handle).is_ok() && handle.borrow().valid
    }

    fn open(&mut self, handle: &FileHandle, apply_filter: bool) -> Result<Box<dyn Stream>> {
        let sub;
        let filter_code;
        let real_size;
        {
            let mut inner = self.inner.borrow_mut();
            inner.check_poisoned()?;
            inner.position_of(handle)?;
            inner.prune_open_files();
            let e = handle.borrow();
            let parent: SharedStream = Rc::clone(&inner.io) as SharedStream;
            sub = SubStream::new(parent, e.offset + e.header_len, e.stored_size);
            filter_code = e.filter.clone();
            real_size = e.real_size;
            drop(e);
            inner.open_files.push(OpenFile {
                stream: Rc::downgrade(&sub),
                entry: Rc::clone(handle),
            });
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
            resize_shared(&inner, &cb_handle, stored, real)
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

    fn open_folder(&mut self, handle: &FileHandle) -> Result<Box<dyn Archive>> {
        let mut inner = self.inner.borrow_mut();
        inner.check_poisoned()?;
        inner.position_of(handle)?;
        let e = handle.borrow();
        if !e.attrs.contains(EntryAttrs::FOLDER) {
            return Err(Error::invalid_operation("entry is not a folder"));
        }
        let parent: SharedStream = Rc::clone(&inner.io) as SharedStream;
        let sub = SubStream::new(parent, e.offset + e.header_len, e.stored_size);
        drop(e);
        inner.open_files.push(OpenFile {
            stream: Rc::downgrade(&sub),
            entry: Rc::clone(handle),
        });
        let contents: SharedStream = sub;
        inner.layout.open_folder(contents)
    }

    fn insert(
        &mut self,
        before: Option<&FileHandle>,
        name: &str,
        stored_size: u64,
        filetype: &str,
        attrs: EntryAttrs,
    ) -> Result<FileHandle> {
        self.inner
            .borrow_mut()
            .insert_impl(before, name, stored_size, filetype, attrs)
    }

    fn remove(&mut self, handle: &FileHandle) -> Result<()> {
        self.inner.borrow_mut().remove_impl(handle)
    }

    fn rename(&mut self, handle: &FileHandle, new_name: &str) -> Result<()> {
        self.inner.borrow_mut().rename_impl(handle, new_name)
    }

    fn move_file(&mut self, handle: &FileHandle, before: Option<&FileHandle>) -> Result<()> {
        // Stored order changes but the handle keeps presenting the
        // same bytes: lift the payload out, re-insert it at the new
        // position, and splice the original handle back in so
        // identity is preserved.
        {
            let inner = self.inner.borrow();
            inner.check_poisoned()?;
            inner.check_writable()?;
            let from = inner.position_of(handle)?;
            let to = match before {
                Some(b) => inner.position_of(b)?,
                None => inner.entries.len(),
            };
            if to == from || to == from + 1 {
                return Ok(());
            }
        }

        let (name, stored, real, filetype, attrs, filter, extra) = {
            let e = handle.borrow();
            (
                e.name.clone(),
                e.stored_size,
                e.real_size,
                e.filetype.clone(),
                e.attrs,
                e.filter.clone(),
                e.extra.clone(),
            )
        };

        // Raw stored bytes, no filter.
        let mut payload = vec![0u8; stored as usize];
        {
            let mut stream = self.open(handle, false)?;
            stream.seek(SeekFrom::Start(0))?;
            stream.read_exact(&mut payload)?;
        }

        self.inner.borrow_mut().remove_impl(handle)?;
        let replacement = self
            .inner
            .borrow_mut()
            .insert_impl(before, &name, stored, &filetype, attrs)?;
        {
            let mut stream = self.open(&replacement, false)?;
            stream.write(&payload)?;
            stream.flush()?;
        }

        // Move the fresh entry's state into the caller's handle and
        // make that handle the member again.
        {
            let mut inner = self.inner.borrow_mut();
            let idx = inner.position_of(&replacement)?;
            {
                let mut e = handle.borrow_mut();
                let r = replacement.borrow();
                e.offset = r.offset;
                e.header_len = r.header_len;
                e.index = r.index;
                e.stored_size = r.stored_size;
                e.real_size = real;
                e.filetype = filetype;
                e.filter = filter;
                e.extra = extra;
                e.valid = true;
            }
            replacement.borrow_mut().valid = false;
            inner.entries[idx] = Rc::clone(handle);
            if real != stored {
                let io = Rc::clone(&inner.io);
                let mut io = io.borrow_mut();
                inner.layout.update_size(&mut io, &handle.borrow())?;
            }
        }
        Ok(())
    }

    fn resize(&mut self, handle: &FileHandle, new_stored: u64, new_real: u64) -> Result<()> {
        resize_shared(&self.inner, handle, new_stored, new_real)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.borrow_mut().flush_impl()
    }

    fn attributes(&self) -> Vec<Attribute> {
        self.inner.borrow().layout.attributes()
    }

    fn set_attribute(&mut self, index: usize, value: AttributeValue) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.check_poisoned()?;
        inner.check_writable()?;
        let io = Rc::clone(&inner.io);
        let shift = {
            let mut io = io.borrow_mut();
            inner.layout.set_attribute(&mut io, index, value)?
        };
        if let Some(shift) = shift {
            inner.apply_dir_shift(shift)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroarc_core::stream::{MemStream, shared};

    /// Bare-bones layout: payloads back to back, no directory at all.
    /// Exercises the engine without any format byte-twiddling.
    struct BareLayout;

    impl FatLayout for BareLayout {
        fn pre_insert(
            &mut self,
            _io: &mut SegStream,
            _count: usize,
            new_entry: &mut Entry,
        ) -> Result<Option<DirShift>> {
            new_entry.header_len = 0;
            Ok(None)
        }
    }

    fn bare_archive() -> (SharedStream, FatArchive) {
        let content: SharedStream = shared(MemStream::new());
        let io = SegStream::new_shared(Rc::clone(&content));
        let caps = Caps {
            filenames: true,
            max_name_len: 12,
            folders: false,
            case_sensitive: false,
            writable: true,
            fixed_count: false,
        };
        (
            content,
            FatArchive::new(io, Box::new(BareLayout), 0, caps, Vec::new()),
        )
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let (_, mut a) = bare_archive();
        let (_, mut b) = bare_archive();
        let h = a
            .insert(None, "X.DAT", 4, "", EntryAttrs::default())
            .unwrap();
        assert!(!b.is_valid(&h));
        assert!(b.remove(&h).is_err());
        assert!(b.resize(&h, 8, 8).is_err());
    }

    #[test]
    fn test_removed_handle_stays_dereferenceable() {
        let (_, mut a) = bare_archive();
        let h = a
            .insert(None, "X.DAT", 4, "", EntryAttrs::default())
            .unwrap();
        let mut stream = a.open(&h, false).unwrap();
        a.remove(&h).unwrap();

        assert!(!h.borrow().valid);
        assert!(!a.is_valid(&h));
        // I/O through the stale stream fails rather than corrupting
        // a neighbour.
        let mut buf = [0u8; 4];
        assert!(stream.read(&mut buf).is_err());
        assert!(stream.write(b"zz").is_err());
    }

    #[test]
    fn test_open_stream_follows_edits() {
        let (_, mut a) = bare_archive();
        let first = a
            .insert(None, "A.DAT", 5, "", EntryAttrs::default())
            .unwrap();
        let second = a
            .insert(None, "B.DAT", 5, "", EntryAttrs::default())
            .unwrap();
        {
            let mut f = a.open(&second, false).unwrap();
            f.write(b"hello").unwrap();
        }

        let mut open_second = a.open(&second, false).unwrap();
        // Growing the first entry shifts the second; the open stream
        // must follow.
        a.resize(&first, 25, 25).unwrap();
        assert_eq!(second.borrow().offset, 25);
        assert_eq!(open_second.read_to_end().unwrap(), b"hello");
    }

    #[test]
    fn test_filtered_entry_compresses_and_tracks_real_size() {
        let (content, mut a) = bare_archive();
        let h = a
            .insert(None, "RUNS.DAT", 0, "", EntryAttrs::COMPRESSED)
            .unwrap();
        h.borrow_mut().filter = "lzw-bash".to_string();

        {
            let mut f = a.open(&h, true).unwrap();
            f.write(&[0x41u8; 256]).unwrap();
            f.flush().unwrap();
        }

        // A run of 256 identical bytes stores smaller than itself,
        // and the directory keeps the decoded length.
        let e = h.borrow();
        assert!(e.stored_size < 256, "stored {} bytes", e.stored_size);
        assert_eq!(e.real_size, 256);
        drop(e);

        a.flush().unwrap();
        assert_eq!(content.borrow().len(), h.borrow().stored_size);

        let mut f = a.open(&h, true).unwrap();
        assert_eq!(f.read_to_end().unwrap(), vec![0x41u8; 256]);
    }

    #[test]
    fn test_insert_before_and_between() {
        let (content, mut a) = bare_archive();
        let b = a
            .insert(None, "B.DAT", 1, "", EntryAttrs::default())
            .unwrap();
        {
            let mut f = a.open(&b, false).unwrap();
            f.write(b"B").unwrap();
        }
        let first = a
            .insert(Some(&b), "A.DAT", 1, "", EntryAttrs::default())
            .unwrap();
        {
            let mut f = a.open(&first, false).unwrap();
            f.write(b"A").unwrap();
        }
        let mid = a
            .insert(Some(&b), "M.DAT", 1, "", EntryAttrs::default())
            .unwrap();
        {
            let mut f = a.open(&mid, false).unwrap();
            f.write(b"M").unwrap();
        }
        a.flush().unwrap();

        let mut c = content.borrow_mut();
        c.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(c.read_to_end().unwrap(), b"AMB");
    }

    #[test]
    fn test_unwritable_caps_refuse_edits() {
        let content: SharedStream = shared(MemStream::new());
        let io = SegStream::new_shared(Rc::clone(&content));
        let caps = Caps {
            filenames: true,
            max_name_len: 12,
            folders: false,
            case_sensitive: false,
            writable: false,
            fixed_count: false,
        };
        let mut a = FatArchive::new(io, Box::new(BareLayout), 0, caps, Vec::new());
        assert!(a.insert(None, "X.DAT", 1, "", EntryAttrs::default()).is_err());
    }
}
