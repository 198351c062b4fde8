//! Append-only journal for cache state transitions.
//!
//! The journal is a textual, LF-terminated, US-ASCII log. Every mutation of
//! the cache appends one operation line; at open time the journal is replayed
//! to rebuild the in-memory index. Periodic compaction rewrites the journal
//! down to one line per live entry using a temp-file plus atomic-rename swap.
//!
//! ## File format
//! ```text
//! libcore.io.DiskLruCache     magic
//! 1                           journal format version
//! <app version>               application data version
//! <value count>               values per entry
//!                             blank separator
//! DIRTY <key>                 edit in flight
//! CLEAN <key> <len>...        values published, one length per index
//! READ <key>                  entry accessed
//! REMOVE <key>                entry deleted
//! ```

pub mod line_reader;
pub(crate) mod record;
pub(crate) mod writer;

use std::fs;
use std::io;
use std::path::Path;

pub use line_reader::LineReader;
pub(crate) use record::JournalRecord;
pub(crate) use writer::JournalWriter;

/// First line of every journal.
pub const MAGIC: &str = "libcore.io.DiskLruCache";

/// Journal format version, the second header line.
pub const VERSION: &str = "1";

/// File name of the live journal.
pub const JOURNAL_FILE: &str = "journal";

/// File name of the journal being rewritten during compaction.
pub const JOURNAL_TMP_FILE: &str = "journal.tmp";

/// File name the old journal is parked under while the swap completes.
pub const JOURNAL_BACKUP_FILE: &str = "journal.bkp";

/// Recover from a crash that interrupted a journal swap.
///
/// If only the backup survives, promote it back to the live journal; if both
/// files exist the swap completed and the backup is stale.
pub(crate) fn restore_backup(directory: &Path) -> io::Result<()> {
    let backup = directory.join(JOURNAL_BACKUP_FILE);
    if backup.exists() {
        let journal = directory.join(JOURNAL_FILE);
        if journal.exists() {
            fs::remove_file(&backup)?;
        } else {
            fs::rename(&backup, &journal)?;
        }
    }
    Ok(())
}

/// Delete a file, treating a missing file as success.
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
