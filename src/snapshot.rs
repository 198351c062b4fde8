//! Immutable view of an entry's values at a point in time.

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use crate::cache::CacheShared;
use crate::editor::Editor;
use crate::error::Result;

/// A read-only handle to the values of an entry as they were when the
/// snapshot was taken.
///
/// All read streams are opened when the snapshot is created, so the values
/// stay readable even after the entry is edited or evicted. Dropping the
/// snapshot closes the streams; close errors are swallowed.
pub struct Snapshot {
    shared: Arc<CacheShared>,
    key: String,
    sequence_number: u64,
    files: Vec<File>,
    lengths: Vec<u64>,
}

impl Snapshot {
    pub(crate) fn new(
        shared: Arc<CacheShared>,
        key: String,
        sequence_number: u64,
        files: Vec<File>,
        lengths: Vec<u64>,
    ) -> Self {
        Self {
            shared,
            key,
            sequence_number,
            files,
            lengths,
        }
    }

    /// The key this snapshot was taken for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The open read stream for the value at `index`.
    ///
    /// Successive reads share one cursor, so a value is consumed once.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn reader(&self, index: usize) -> &File {
        &self.files[index]
    }

    /// Read the remaining bytes of the value at `index` as a string.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn string(&self, index: usize) -> Result<String> {
        let mut bytes = Vec::new();
        let mut reader = &self.files[index];
        reader.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Byte length of the value at `index` as committed.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn length(&self, index: usize) -> u64 {
        self.lengths[index]
    }

    /// Start an edit of this entry, or `None` if the entry was committed to
    /// or removed after this snapshot was taken, or another edit is active.
    pub fn edit(&self) -> Result<Option<Editor>> {
        self.shared
            .edit_impl(&self.key, Some(self.sequence_number))
    }

    /// Close the snapshot's read streams.
    ///
    /// Dropping the snapshot does the same; this name just makes the intent
    /// explicit at call sites.
    pub fn close(self) {}
}
