//! Bounded, crash-tolerant, on-disk LRU cache core.
//!
//! The cache stores a fixed number of byte-stream values per string key.
//! Every state change is appended to a textual journal before the operation
//! returns, so open-time recovery can rebuild the in-memory index by replay.
//! When the total of committed value lengths exceeds the byte budget, entries
//! are evicted least-recently-used first by a background cleanup task.
//!
//! All mutable state sits behind one exclusive lock: the LRU index, the size
//! counters, the journal writer, and every entry field. Value file I/O done
//! through [`Snapshot`] and [`Editor`] stream handles happens outside the
//! lock; the handles themselves must not be shared across threads.
//!
//! A cache directory is a single-writer resource. Opening the same directory
//! from two cache instances, or two processes, is undefined behavior.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::editor::Editor;
use crate::entry::{clean_path, dirty_path, validate_key, Entry, REPLAYED_EDITOR};
use crate::error::{CacheError, Result};
use crate::index::LruIndex;
use crate::journal::{self, JournalRecord, JournalWriter, LineReader};
use crate::runner::TaskRunner;
use crate::snapshot::Snapshot;
use crate::stats::CacheStats;

/// Journal lines beyond one per live entry before compaction is considered.
const REDUNDANT_OP_COMPACT_THRESHOLD: usize = 2000;

/// A bounded, crash-tolerant, on-disk LRU cache.
///
/// Handles are cheap to clone and safe to share across threads; every clone
/// operates on the same underlying cache.
#[derive(Clone)]
pub struct DiskLruCache {
    shared: Arc<CacheShared>,
}

/// State shared by cache handles, editors, snapshots, and the cleanup task.
pub(crate) struct CacheShared {
    pub(crate) inner: Mutex<CacheInner>,
    runner: TaskRunner,
    pub(crate) stats: Arc<CacheStats>,
}

/// All lock-guarded cache state.
pub(crate) struct CacheInner {
    pub(crate) directory: PathBuf,
    app_version: u32,
    pub(crate) value_count: usize,
    max_size: u64,
    pub(crate) size: u64,
    journal: Option<JournalWriter>,
    pub(crate) lru: LruIndex,
    redundant_op_count: usize,
    next_sequence_number: u64,
    next_editor_id: u64,
    stats: Arc<CacheStats>,
}

impl DiskLruCache {
    /// Open the cache in `directory`, creating it if necessary.
    ///
    /// `app_version` is baked into the journal header; bumping it discards
    /// all cached data at the next open. `value_count` fixes how many values
    /// each entry holds and `max_size` is the byte budget for committed
    /// values. The budget is advisory between cleanup passes: the cache may
    /// transiently exceed it, and it never counts filesystem overhead or the
    /// journal itself.
    ///
    /// An unreadable or corrupt journal is not an error: the directory is
    /// wiped and the cache starts fresh. Open fails only on invalid
    /// arguments or when the filesystem cannot be read or reset.
    pub fn open(
        directory: impl AsRef<Path>,
        app_version: u32,
        value_count: usize,
        max_size: u64,
    ) -> Result<Self> {
        if max_size == 0 {
            return Err(CacheError::invalid_argument("max_size <= 0"));
        }
        if value_count == 0 {
            return Err(CacheError::invalid_argument("value_count <= 0"));
        }
        let directory = directory.as_ref().to_path_buf();
        let stats = Arc::new(CacheStats::new());

        // A crash during a journal swap can leave the backup as the only
        // complete journal. Resolve that before looking for the live file.
        journal::restore_backup(&directory)?;

        if directory.join(journal::JOURNAL_FILE).exists() {
            let mut inner = CacheInner::new(
                directory.clone(),
                app_version,
                value_count,
                max_size,
                Arc::clone(&stats),
            );
            match inner.read_journal().and_then(|()| inner.process_journal()) {
                Ok(()) => return Ok(Self::from_inner(inner, stats)),
                Err(err) => {
                    tracing::warn!(
                        directory = %directory.display(),
                        error = %err,
                        "cache is corrupt, removing directory contents"
                    );
                    inner.journal = None;
                    delete_contents(&directory)?;
                }
            }
        }

        fs::create_dir_all(&directory)?;
        let mut inner = CacheInner::new(
            directory,
            app_version,
            value_count,
            max_size,
            Arc::clone(&stats),
        );
        inner.rebuild_journal()?;
        Ok(Self::from_inner(inner, stats))
    }

    fn from_inner(inner: CacheInner, stats: Arc<CacheStats>) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                inner: Mutex::new(inner),
                runner: TaskRunner::new(),
                stats,
            }),
        }
    }

    /// Return a snapshot of the values for `key`, or `None` if the key is
    /// absent or has never been fully committed.
    ///
    /// A returned snapshot holds open read handles for every value, so it
    /// keeps observing the same data even if the entry is edited or evicted
    /// afterwards. The lookup promotes the key to most-recently-used.
    pub fn get(&self, key: &str) -> Result<Option<Snapshot>> {
        self.shared.get_impl(key)
    }

    /// Start an edit of `key`, or return `None` if another editor is active.
    ///
    /// The entry is created if it does not exist yet. Edits never queue.
    pub fn edit(&self, key: &str) -> Result<Option<Editor>> {
        self.shared.edit_impl(key, None)
    }

    /// Drop `key` and delete its value files.
    ///
    /// Returns false if the key is absent or currently being edited.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.shared.remove_impl(key)
    }

    /// Total bytes of committed values.
    ///
    /// May exceed [`max_size`](DiskLruCache::max_size) briefly while a
    /// cleanup task is queued.
    pub fn size(&self) -> u64 {
        self.shared.inner.lock().size
    }

    /// The current byte budget.
    pub fn max_size(&self) -> u64 {
        self.shared.inner.lock().max_size
    }

    /// Change the byte budget and schedule a cleanup pass.
    pub fn set_max_size(&self, max_size: u64) {
        self.shared.inner.lock().max_size = max_size;
        self.shared.submit_cleanup();
    }

    /// Number of values per entry.
    pub fn value_count(&self) -> usize {
        self.shared.inner.lock().value_count
    }

    /// The directory this cache stores its files in.
    pub fn directory(&self) -> PathBuf {
        self.shared.inner.lock().directory.clone()
    }

    /// Operation counters for this cache.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Evict down to the byte budget, then flush the journal writer.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        inner.check_not_closed()?;
        inner.trim_to_size()?;
        inner.journal_mut()?.flush()?;
        Ok(())
    }

    /// Whether [`close`](DiskLruCache::close) has completed.
    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().journal.is_none()
    }

    /// Close the cache. Idempotent.
    ///
    /// Live editors are aborted, the cache is trimmed to its budget, and the
    /// journal writer is released. Further operations fail with an
    /// invalid-state error; snapshots already handed out stay readable.
    pub fn close(&self) -> Result<()> {
        self.shared.close_impl()
    }

    /// Close the cache and delete everything it stored.
    ///
    /// The directory itself is kept; its contents are removed recursively.
    pub fn delete(&self) -> Result<()> {
        self.shared.close_impl()?;
        let directory = self.shared.inner.lock().directory.clone();
        delete_contents(&directory)?;
        Ok(())
    }
}

impl CacheShared {
    pub(crate) fn get_impl(self: &Arc<Self>, key: &str) -> Result<Option<Snapshot>> {
        let mut inner = self.inner.lock();
        inner.check_not_closed()?;
        validate_key(key)?;

        let (lengths, sequence_number) = {
            let Some(entry) = inner.lru.promote(key) else {
                self.stats.record_miss();
                return Ok(None);
            };
            if !entry.readable {
                self.stats.record_miss();
                return Ok(None);
            }
            (entry.lengths.clone(), entry.sequence_number)
        };

        // The read is journaled and the LRU promotion stands even if opening
        // the value files fails below.
        inner.redundant_op_count += 1;
        inner.journal_mut()?.append(&JournalRecord::Read {
            key: key.to_string(),
        })?;
        if inner.journal_rebuild_required() {
            self.submit_cleanup();
        }

        // Open every stream up front so the snapshot observes one publish,
        // never a mix of two edits.
        let mut files = Vec::with_capacity(inner.value_count);
        for index in 0..inner.value_count {
            match File::open(clean_path(&inner.directory, key, index)) {
                Ok(file) => files.push(file),
                Err(_) => {
                    self.stats.record_miss();
                    return Ok(None);
                }
            }
        }

        self.stats.record_hit();
        Ok(Some(Snapshot::new(
            Arc::clone(self),
            key.to_string(),
            sequence_number,
            files,
            lengths,
        )))
    }

    pub(crate) fn edit_impl(
        self: &Arc<Self>,
        key: &str,
        expected_sequence: Option<u64>,
    ) -> Result<Option<Editor>> {
        let mut inner = self.inner.lock();
        inner.check_not_closed()?;
        validate_key(key)?;

        let mut exists = false;
        if let Some(entry) = inner.lru.promote(key) {
            exists = true;
            if let Some(expected) = expected_sequence {
                if entry.sequence_number != expected {
                    // The snapshot this edit came from is stale.
                    return Ok(None);
                }
            }
            if entry.current_editor.is_some() {
                return Ok(None);
            }
        }
        if !exists {
            if expected_sequence.is_some() {
                return Ok(None);
            }
            let value_count = inner.value_count;
            inner.lru.insert(key.to_string(), Entry::new(value_count));
        }

        let editor_id = inner.next_editor_id;
        inner.next_editor_id += 1;
        if let Some(entry) = inner.lru.peek_mut(key) {
            entry.current_editor = Some(editor_id);
        }

        let value_count = inner.value_count;
        let journal = inner.journal_mut()?;
        journal.append(&JournalRecord::Dirty {
            key: key.to_string(),
        })?;
        journal.flush()?;

        Ok(Some(Editor::new(
            Arc::clone(self),
            key.to_string(),
            editor_id,
            value_count,
        )))
    }

    pub(crate) fn remove_impl(self: &Arc<Self>, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        inner.check_not_closed()?;
        validate_key(key)?;

        let removed = inner.remove_entry(key)?;
        if inner.journal_rebuild_required() {
            self.submit_cleanup();
        }
        Ok(removed)
    }

    /// Finish an edit on behalf of an [`Editor`], then run the size and
    /// compaction checks every mutation ends with.
    pub(crate) fn complete_edit_impl(
        self: &Arc<Self>,
        key: &str,
        editor_id: u64,
        written: &[bool],
        success: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.complete_edit(key, editor_id, written, success)?;
        if inner.size > inner.max_size || inner.journal_rebuild_required() {
            self.submit_cleanup();
        }
        Ok(())
    }

    fn close_impl(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.journal.is_none() {
            return Ok(());
        }

        // Snapshot the key list first; aborting mutates the index.
        for key in inner.lru.keys_lru_first() {
            if let Some(editor_id) = inner.lru.peek(&key).and_then(|e| e.current_editor) {
                inner.complete_edit(&key, editor_id, &[], false)?;
            }
        }
        inner.trim_to_size()?;
        if let Some(mut journal) = inner.journal.take() {
            journal.flush()?;
        }
        Ok(())
    }

    /// Queue the cleanup task: trim to size, and compact the journal when
    /// the redundancy trigger has fired. Errors never leave the worker.
    fn submit_cleanup(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.runner.submit(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut inner = shared.inner.lock();
            if inner.journal.is_none() {
                return;
            }
            if let Err(err) = inner.trim_to_size() {
                tracing::warn!(error = %err, "background trim failed");
                return;
            }
            if inner.journal_rebuild_required() {
                match inner.rebuild_journal() {
                    Ok(()) => inner.redundant_op_count = 0,
                    Err(err) => tracing::warn!(error = %err, "journal rebuild failed"),
                }
            }
            shared.stats.record_cleanup();
        });
    }
}

impl CacheInner {
    fn new(
        directory: PathBuf,
        app_version: u32,
        value_count: usize,
        max_size: u64,
        stats: Arc<CacheStats>,
    ) -> Self {
        Self {
            directory,
            app_version,
            value_count,
            max_size,
            size: 0,
            journal: None,
            lru: LruIndex::new(),
            redundant_op_count: 0,
            next_sequence_number: 1,
            next_editor_id: 1,
            stats,
        }
    }

    pub(crate) fn check_not_closed(&self) -> Result<()> {
        if self.journal.is_none() {
            return Err(CacheError::invalid_state("cache is closed"));
        }
        Ok(())
    }

    fn journal_mut(&mut self) -> Result<&mut JournalWriter> {
        self.journal
            .as_mut()
            .ok_or_else(|| CacheError::invalid_state("cache is closed"))
    }

    fn journal_rebuild_required(&self) -> bool {
        self.redundant_op_count >= REDUNDANT_OP_COMPACT_THRESHOLD
            && self.redundant_op_count >= self.lru.len()
    }

    /// Replay the journal into the index.
    fn read_journal(&mut self) -> Result<()> {
        let path = self.directory.join(journal::JOURNAL_FILE);
        let file = File::open(&path)?;
        let mut reader = LineReader::new(file);

        let magic = reader.read_line()?;
        let version = reader.read_line()?;
        let app_version_line = reader.read_line()?;
        let value_count_line = reader.read_line()?;
        let blank = reader.read_line()?;
        if magic != journal::MAGIC
            || version != journal::VERSION
            || app_version_line != self.app_version.to_string()
            || value_count_line != self.value_count.to_string()
            || !blank.is_empty()
        {
            return Err(CacheError::corrupt(format!(
                "unexpected journal header: [{magic}, {version}, {app_version_line}, \
                 {value_count_line}, {blank}]"
            )));
        }

        let mut line_count = 0usize;
        loop {
            match reader.read_line() {
                Ok(line) => {
                    self.replay(JournalRecord::parse(&line)?)?;
                    line_count += 1;
                }
                Err(CacheError::EndOfStream) => break,
                Err(err) => return Err(err),
            }
        }
        self.redundant_op_count = line_count.saturating_sub(self.lru.len());

        if reader.has_unterminated_line() {
            // The tail of the journal was lost mid-write. Compact now so
            // appends go to a well-formed file.
            self.rebuild_journal()?;
        } else {
            self.journal = Some(JournalWriter::open_append(&path)?);
        }
        Ok(())
    }

    fn replay(&mut self, record: JournalRecord) -> Result<()> {
        let value_count = self.value_count;
        match record {
            JournalRecord::Remove { key } => {
                self.lru.remove(&key);
            }
            JournalRecord::Clean { key, lengths } => {
                if lengths.len() != value_count {
                    return Err(CacheError::corrupt(format!(
                        "expected {value_count} value lengths, got {}",
                        lengths.len()
                    )));
                }
                let entry = self.lru.get_or_insert(&key, value_count);
                entry.readable = true;
                entry.current_editor = None;
                entry.lengths = lengths;
            }
            JournalRecord::Dirty { key } => {
                let entry = self.lru.get_or_insert(&key, value_count);
                entry.current_editor = Some(REPLAYED_EDITOR);
            }
            JournalRecord::Read { key } => {
                // The lookup is the point: it creates the entry if needed
                // and moves it to the most-recently-used position.
                self.lru.get_or_insert(&key, value_count);
            }
        }
        Ok(())
    }

    /// Reconcile the replayed index with the filesystem: tally sizes for
    /// committed entries and discard entries whose edit never completed.
    fn process_journal(&mut self) -> Result<()> {
        journal::remove_if_exists(&self.directory.join(journal::JOURNAL_TMP_FILE))?;

        for key in self.lru.keys_lru_first() {
            let Some(entry) = self.lru.peek(&key) else {
                continue;
            };
            if entry.current_editor.is_none() {
                self.size += entry.total_length();
            } else {
                for index in 0..self.value_count {
                    journal::remove_if_exists(&clean_path(&self.directory, &key, index))?;
                    journal::remove_if_exists(&dirty_path(&self.directory, &key, index))?;
                }
                self.lru.remove(&key);
            }
        }
        Ok(())
    }

    /// Rewrite the journal down to one line per live entry, oldest first so
    /// replay reproduces the current access order.
    fn rebuild_journal(&mut self) -> Result<()> {
        if let Some(mut journal) = self.journal.take() {
            journal.flush()?;
        }

        let mut records = Vec::with_capacity(self.lru.len());
        for key in self.lru.keys_lru_first() {
            if let Some(entry) = self.lru.peek(&key) {
                records.push(if entry.current_editor.is_some() {
                    JournalRecord::Dirty { key }
                } else {
                    JournalRecord::Clean {
                        key,
                        lengths: entry.lengths.clone(),
                    }
                });
            }
        }

        self.journal = Some(JournalWriter::rewrite(
            &self.directory,
            self.app_version,
            self.value_count,
            &records,
        )?);
        tracing::debug!(
            directory = %self.directory.display(),
            entries = records.len(),
            "journal rebuilt"
        );
        Ok(())
    }

    /// Finish an edit: on success publish the staged values, otherwise
    /// discard them and revert (or drop a never-published entry).
    pub(crate) fn complete_edit(
        &mut self,
        key: &str,
        editor_id: u64,
        written: &[bool],
        success: bool,
    ) -> Result<()> {
        let (slot, readable) = match self.lru.peek(key) {
            Some(entry) => (entry.current_editor, entry.readable),
            None => {
                return Err(CacheError::invalid_state(
                    "entry is no longer in the index",
                ))
            }
        };
        if slot != Some(editor_id) {
            return Err(CacheError::invalid_state(
                "editor is no longer current for this entry",
            ));
        }

        // A first publish must supply every value.
        if success && !readable {
            for index in 0..self.value_count {
                if !written.get(index).copied().unwrap_or(false) {
                    self.apply_edit(key, false)?;
                    return Err(CacheError::invalid_state(format!(
                        "newly created entry didn't create value for index {index}"
                    )));
                }
                if !dirty_path(&self.directory, key, index).exists() {
                    // The staging file vanished out from under the editor.
                    // Drop the unpublished entry without journaling anything.
                    self.discard_unpublished(key)?;
                    return Ok(());
                }
            }
        }

        self.apply_edit(key, success)
    }

    fn apply_edit(&mut self, key: &str, success: bool) -> Result<()> {
        let value_count = self.value_count;
        let mut published: Vec<Option<u64>> = vec![None; value_count];
        for (index, slot) in published.iter_mut().enumerate() {
            let dirty = dirty_path(&self.directory, key, index);
            if success {
                if dirty.exists() {
                    let clean = clean_path(&self.directory, key, index);
                    journal::remove_if_exists(&clean)?;
                    fs::rename(&dirty, &clean)?;
                    *slot = Some(fs::metadata(&clean)?.len());
                }
                // No staging file: the old value at this index is retained.
            } else {
                journal::remove_if_exists(&dirty)?;
            }
        }

        self.redundant_op_count += 1;

        let record = {
            let entry = match self.lru.peek_mut(key) {
                Some(entry) => entry,
                None => {
                    return Err(CacheError::invalid_state(
                        "entry is no longer in the index",
                    ))
                }
            };
            entry.current_editor = None;
            for (index, new_length) in published.into_iter().enumerate() {
                if let Some(new_length) = new_length {
                    let old_length = entry.lengths[index];
                    entry.lengths[index] = new_length;
                    self.size = self.size + new_length - old_length;
                }
            }
            if entry.readable || success {
                entry.readable = true;
                if success {
                    entry.sequence_number = self.next_sequence_number;
                    self.next_sequence_number += 1;
                }
                JournalRecord::Clean {
                    key: key.to_string(),
                    lengths: entry.lengths.clone(),
                }
            } else {
                JournalRecord::Remove {
                    key: key.to_string(),
                }
            }
        };

        if matches!(record, JournalRecord::Remove { .. }) {
            self.lru.remove(key);
        }
        let journal = self.journal_mut()?;
        journal.append(&record)?;
        journal.flush()?;
        Ok(())
    }

    /// Silently drop an entry whose first publish fell apart: no journal
    /// line is written, only the staging files are cleaned up.
    fn discard_unpublished(&mut self, key: &str) -> Result<()> {
        for index in 0..self.value_count {
            journal::remove_if_exists(&dirty_path(&self.directory, key, index))?;
        }
        self.lru.remove(key);
        Ok(())
    }

    /// Delete the entry and its value files. Returns false when the key is
    /// absent or an editor holds it.
    fn remove_entry(&mut self, key: &str) -> Result<bool> {
        let lengths = match self.lru.peek(key) {
            None => return Ok(false),
            Some(entry) if entry.current_editor.is_some() => return Ok(false),
            Some(entry) => entry.lengths.clone(),
        };

        for (index, &length) in lengths.iter().enumerate() {
            let clean = clean_path(&self.directory, key, index);
            if clean.exists() {
                fs::remove_file(&clean).map_err(|err| {
                    io::Error::new(
                        err.kind(),
                        format!("failed to delete {}: {err}", clean.display()),
                    )
                })?;
            }
            self.size -= length;
        }

        self.redundant_op_count += 1;
        let journal = self.journal_mut()?;
        journal.append(&JournalRecord::Remove {
            key: key.to_string(),
        })?;
        journal.flush()?;
        self.lru.remove(key);
        Ok(true)
    }

    /// Evict least-recently-used entries until the budget holds. Entries
    /// with an active editor are skipped, not waited on.
    fn trim_to_size(&mut self) -> Result<()> {
        while self.size > self.max_size {
            let victim = self.lru.keys_lru_first().into_iter().find(|key| {
                self.lru
                    .peek(key)
                    .is_some_and(|entry| entry.current_editor.is_none())
            });
            let Some(key) = victim else { break };
            self.remove_entry(&key)?;
            self.stats.record_eviction();
        }
        Ok(())
    }
}

/// Recursively delete the contents of `directory`, keeping the directory.
fn delete_contents(directory: &Path) -> io::Result<()> {
    if !directory.exists() {
        return Ok(());
    }
    for dir_entry in fs::read_dir(directory)? {
        let path = dir_entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
