//! Per-key cache entry state and value file naming.

use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};

/// Editor id installed during journal replay for entries whose edit never
/// completed. Real editor ids start at 1.
pub(crate) const REPLAYED_EDITOR: u64 = 0;

/// In-memory record for one key, spanning a fixed number of value slots.
#[derive(Debug)]
pub(crate) struct Entry {
    /// Byte length of each committed value; zero until first publish.
    pub lengths: Vec<u64>,
    /// True once a complete value set has been committed.
    pub readable: bool,
    /// Id of the editor currently holding this entry's edit slot.
    pub current_editor: Option<u64>,
    /// Bumped on every successful commit; stale snapshots compare against it.
    pub sequence_number: u64,
}

impl Entry {
    /// Create a fresh, unpublished entry with `value_count` empty slots.
    pub fn new(value_count: usize) -> Self {
        Self {
            lengths: vec![0; value_count],
            readable: false,
            current_editor: None,
            sequence_number: 0,
        }
    }

    /// Sum of the committed value lengths.
    pub fn total_length(&self) -> u64 {
        self.lengths.iter().sum()
    }
}

/// Path of the published value file for `key` at `index`.
pub(crate) fn clean_path(directory: &Path, key: &str, index: usize) -> PathBuf {
    directory.join(format!("{key}.{index}"))
}

/// Path of the in-progress staging file for `key` at `index`.
pub(crate) fn dirty_path(directory: &Path, key: &str, index: usize) -> PathBuf {
    directory.join(format!("{key}.{index}.tmp"))
}

/// Validate a user-supplied key.
///
/// Keys name files on disk and appear as single journal fields, so the
/// charset excludes separators and anything path-hostile.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= 64
        && key
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::invalid_argument(format!(
            "keys must match regex [a-z0-9_-]{{1,64}}: \"{key}\""
        )))
    }
}
