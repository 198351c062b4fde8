//! Appending journal writer and crash-safe journal rewrite.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::record::JournalRecord;
use super::{
    remove_if_exists, JOURNAL_BACKUP_FILE, JOURNAL_FILE, JOURNAL_TMP_FILE, MAGIC, VERSION,
};

/// Buffered writer appending operation lines to the live journal.
pub(crate) struct JournalWriter {
    writer: BufWriter<File>,
}

impl JournalWriter {
    /// Open the journal at `path` for appending.
    pub fn open_append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one operation line. The line stays buffered until [`flush`].
    ///
    /// [`flush`]: JournalWriter::flush
    pub fn append(&mut self, record: &JournalRecord) -> io::Result<()> {
        self.writer.write_all(record.encode().as_bytes())?;
        self.writer.write_all(b"\n")
    }

    /// Flush buffered lines to the filesystem.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Rewrite the journal to contain only the header and `records`, then
    /// swap it into place and reopen for appending.
    ///
    /// The swap sequence tolerates a crash at any point: write `journal.tmp`,
    /// park the old journal as `journal.bkp`, rename the temp file over the
    /// live name, then drop the backup. Open-time recovery resolves whichever
    /// intermediate state a crash leaves behind.
    pub fn rewrite(
        directory: &Path,
        app_version: u32,
        value_count: usize,
        records: &[JournalRecord],
    ) -> io::Result<Self> {
        let journal = directory.join(JOURNAL_FILE);
        let tmp = directory.join(JOURNAL_TMP_FILE);
        let backup = directory.join(JOURNAL_BACKUP_FILE);

        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            write_header(&mut writer, app_version, value_count)?;
            for record in records {
                writer.write_all(record.encode().as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        if journal.exists() {
            remove_if_exists(&backup)?;
            std::fs::rename(&journal, &backup)?;
        }
        std::fs::rename(&tmp, &journal)?;
        let _ = std::fs::remove_file(&backup);

        Self::open_append(&journal)
    }
}

/// Write the five header lines.
fn write_header<W: Write>(writer: &mut W, app_version: u32, value_count: usize) -> io::Result<()> {
    writeln!(writer, "{MAGIC}")?;
    writeln!(writer, "{VERSION}")?;
    writeln!(writer, "{app_version}")?;
    writeln!(writer, "{value_count}")?;
    writeln!(writer)
}
