//! Exclusive, transactional editor for an entry's values.
//!
//! At most one editor exists per entry; a second `edit` returns `None`
//! instead of queuing. Values are staged in `<key>.<i>.tmp` files and
//! published atomically by [`commit`]. Output streams hide their I/O errors
//! and record them in a shared flag instead; a commit that saw any write
//! error turns into an abort that also drops a previously published entry,
//! since its staleness can no longer be ruled out.
//!
//! [`commit`]: Editor::commit

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::CacheShared;
use crate::entry::{clean_path, dirty_path};
use crate::error::{CacheError, Result};

/// Transactional handle for editing one entry.
///
/// Consumed by [`commit`](Editor::commit) or [`abort`](Editor::abort).
/// Dropping an editor that did neither aborts the edit, swallowing errors.
pub struct Editor {
    shared: Arc<CacheShared>,
    key: String,
    id: u64,
    value_count: usize,
    written: Vec<bool>,
    has_errors: Arc<AtomicBool>,
    finished: bool,
}

impl Editor {
    pub(crate) fn new(
        shared: Arc<CacheShared>,
        key: String,
        id: u64,
        value_count: usize,
    ) -> Self {
        Self {
            shared,
            key,
            id,
            value_count,
            written: vec![false; value_count],
            has_errors: Arc::new(AtomicBool::new(false)),
            finished: false,
        }
    }

    /// The key being edited.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Open a reader on the last committed value at `index`, or `None` if
    /// the entry has never been published.
    pub fn reader(&self, index: usize) -> Result<Option<File>> {
        self.check_index(index)?;
        let inner = self.shared.inner.lock();
        let entry = inner
            .lru
            .peek(&self.key)
            .filter(|entry| entry.current_editor == Some(self.id))
            .ok_or_else(|| {
                CacheError::invalid_state("editor is no longer current for this entry")
            })?;
        if !entry.readable {
            return Ok(None);
        }
        match File::open(clean_path(&inner.directory, &self.key, index)) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The last committed value at `index` as a string, or `None` if the
    /// entry has never been published.
    pub fn string(&self, index: usize) -> Result<Option<String>> {
        match self.reader(index)? {
            Some(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            None => Ok(None),
        }
    }

    /// Open an output stream that stages a new value for `index`.
    ///
    /// The stream never raises: write, flush, and close failures are
    /// suppressed and recorded, and the eventual [`commit`](Editor::commit)
    /// fails instead. If the staging file cannot even be created, the
    /// returned writer silently discards everything.
    pub fn new_output_stream(&mut self, index: usize) -> Result<ValueWriter> {
        self.check_index(index)?;
        let inner = self.shared.inner.lock();
        let entry = inner
            .lru
            .peek(&self.key)
            .filter(|entry| entry.current_editor == Some(self.id))
            .ok_or_else(|| {
                CacheError::invalid_state("editor is no longer current for this entry")
            })?;
        if !entry.readable {
            self.written[index] = true;
        }

        let dirty = dirty_path(&inner.directory, &self.key, index);
        let file = match File::create(&dirty) {
            Ok(file) => Some(file),
            // The cache directory may have been deleted out from under us.
            Err(_) => fs::create_dir_all(&inner.directory)
                .and_then(|()| File::create(&dirty))
                .ok(),
        };
        Ok(ValueWriter {
            file,
            has_errors: Arc::clone(&self.has_errors),
        })
    }

    /// Stage `value` as the new contents of `index`.
    pub fn set(&mut self, index: usize, value: &str) -> Result<()> {
        let mut writer = self.new_output_stream(index)?;
        // ValueWriter reports errors through the editor's error flag.
        let _ = writer.write_all(value.as_bytes());
        let _ = writer.flush();
        Ok(())
    }

    /// Publish the staged values atomically.
    ///
    /// If any output stream saw an error, the edit is aborted instead and
    /// the entry is removed outright. A first publish that is missing a
    /// value fails with an invalid-state error.
    pub fn commit(mut self) -> Result<()> {
        if self.has_errors.load(Ordering::Relaxed) {
            self.shared
                .complete_edit_impl(&self.key, self.id, &self.written, false)?;
            // The previous contents can no longer be trusted either.
            self.shared.remove_impl(&self.key)?;
        } else {
            self.shared
                .complete_edit_impl(&self.key, self.id, &self.written, true)?;
        }
        self.finished = true;
        Ok(())
    }

    /// Discard the staged values. A never-published entry is removed.
    pub fn abort(mut self) -> Result<()> {
        self.shared
            .complete_edit_impl(&self.key, self.id, &self.written, false)?;
        self.finished = true;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.value_count {
            return Err(CacheError::invalid_argument(format!(
                "expected index {index} to be less than {}",
                self.value_count
            )));
        }
        Ok(())
    }
}

impl Drop for Editor {
    /// Abort unless the editor was committed or aborted explicitly.
    ///
    /// Failures are swallowed; in particular an editor already finished by
    /// [`DiskLruCache::close`](crate::DiskLruCache::close) drops quietly.
    fn drop(&mut self) {
        if !self.finished {
            let _ = self
                .shared
                .complete_edit_impl(&self.key, self.id, &self.written, false);
        }
    }
}

/// Output stream for one staged value.
///
/// I/O failures are suppressed: writes report full success and the error is
/// latched on the owning editor instead.
pub struct ValueWriter {
    file: Option<File>,
    has_errors: Arc<AtomicBool>,
}

impl Write for ValueWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = &mut self.file {
            if file.write_all(buf).is_err() {
                self.has_errors.store(true, Ordering::Relaxed);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.file {
            if file.flush().is_err() {
                self.has_errors.store(true, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}
