//! Buffered line reader with a distinct end-of-stream signal.
//!
//! Lines are terminated by LF or CRLF; the terminator is stripped from the
//! returned line. End of stream is reported as [`CacheError::EndOfStream`]
//! rather than a generic I/O error so journal replay can stop cleanly. An
//! unterminated trailing line is discarded, and a flag records that it was
//! seen so the caller can rewrite the journal before appending to it.

use std::io::Read;

use crate::error::{CacheError, Result};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Default buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Line reader over a byte stream, backed by a single fixed-capacity buffer.
///
/// Only ASCII-family encodings are supported: CR and LF bytes must appear
/// only as themselves. Lines shorter than the buffer are returned without
/// re-reading; longer lines spill into a growable side buffer assembled from
/// successive refills.
pub struct LineReader<R: Read> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
    unterminated: bool,
}

impl<R: Read> LineReader<R> {
    /// Create a reader with the default capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    /// Create a reader with the given buffer capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        assert!(capacity >= 1, "capacity must be at least 1");
        Self {
            inner,
            buf: vec![0; capacity].into_boxed_slice(),
            pos: 0,
            end: 0,
            unterminated: false,
        }
    }

    /// Whether the stream ended in the middle of a line.
    ///
    /// The partial line itself is discarded; this flag is the only trace of
    /// it. Meaningful once `read_line` has returned `EndOfStream`.
    pub fn has_unterminated_line(&self) -> bool {
        self.unterminated
    }

    /// Read the next line, without its terminator.
    ///
    /// Returns [`CacheError::EndOfStream`] when the underlying stream is
    /// exhausted at a line boundary, and also when it ends mid-line (the
    /// partial line is dropped and the unterminated flag set).
    pub fn read_line(&mut self) -> Result<String> {
        if self.pos >= self.end {
            self.fill()?;
        }

        // Common case: the whole line is already buffered.
        if let Some(at) = find_lf(&self.buf[self.pos..self.end]) {
            let terminator = self.pos + at;
            let line = trim_cr(&self.buf[self.pos..terminator]);
            let line = String::from_utf8_lossy(line).into_owned();
            self.pos = terminator + 1;
            return Ok(line);
        }

        // The line continues past the buffered bytes: spill and keep filling.
        let mut spill = Vec::with_capacity((self.end - self.pos) + 80);
        loop {
            spill.extend_from_slice(&self.buf[self.pos..self.end]);
            self.pos = self.end;
            match self.fill() {
                Ok(()) => {}
                Err(CacheError::EndOfStream) => {
                    self.unterminated = true;
                    return Err(CacheError::EndOfStream);
                }
                Err(err) => return Err(err),
            }
            if let Some(at) = find_lf(&self.buf[self.pos..self.end]) {
                let terminator = self.pos + at;
                spill.extend_from_slice(&self.buf[self.pos..terminator]);
                self.pos = terminator + 1;
                if spill.last() == Some(&CR) {
                    spill.pop();
                }
                return Ok(String::from_utf8_lossy(&spill).into_owned());
            }
        }
    }

    fn fill(&mut self) -> Result<()> {
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Err(CacheError::EndOfStream),
                Ok(n) => {
                    self.pos = 0;
                    self.end = n;
                    return Ok(());
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn find_lf(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == LF)
}

fn trim_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(&CR) => &line[..line.len() - 1],
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8], capacity: usize) -> LineReader<Cursor<Vec<u8>>> {
        LineReader::with_capacity(Cursor::new(bytes.to_vec()), capacity)
    }

    fn read_all(reader: &mut LineReader<Cursor<Vec<u8>>>) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match reader.read_line() {
                Ok(line) => lines.push(line),
                Err(CacheError::EndOfStream) => return lines,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    }

    #[test]
    fn test_lf_and_crlf_terminators() {
        let mut r = reader(b"alpha\nbeta\r\ngamma\n", 32);
        assert_eq!(read_all(&mut r), vec!["alpha", "beta", "gamma"]);
        assert!(!r.has_unterminated_line());
    }

    #[test]
    fn test_empty_lines() {
        let mut r = reader(b"\n\r\nx\n", 32);
        assert_eq!(read_all(&mut r), vec!["", "", "x"]);
    }

    #[test]
    fn test_line_exactly_buffer_sized() {
        let line = "a".repeat(32);
        let data = format!("{line}\n{line}\n");
        let mut r = reader(data.as_bytes(), 32);
        assert_eq!(read_all(&mut r), vec![line.clone(), line]);
    }

    #[test]
    fn test_line_spanning_multiple_buffers() {
        let line = "x".repeat(100);
        let data = format!("{line}\nshort\n");
        let mut r = reader(data.as_bytes(), 32);
        assert_eq!(read_all(&mut r), vec![line, "short".to_string()]);
    }

    #[test]
    fn test_crlf_straddling_buffer_boundary() {
        // 31 bytes of payload, then CR as the 32nd byte and LF in the next fill.
        let line = "y".repeat(31);
        let data = format!("{line}\r\nnext\n");
        let mut r = reader(data.as_bytes(), 32);
        assert_eq!(read_all(&mut r), vec![line, "next".to_string()]);
    }

    #[test]
    fn test_unterminated_trailing_line_is_discarded() {
        let mut r = reader(b"kept\ndropped", 32);
        assert_eq!(r.read_line().unwrap(), "kept");
        assert!(matches!(r.read_line(), Err(CacheError::EndOfStream)));
        assert!(r.has_unterminated_line());
    }

    #[test]
    fn test_unterminated_line_longer_than_buffer() {
        let mut data = b"kept\n".to_vec();
        data.extend(std::iter::repeat(b'z').take(70));
        let mut r = reader(&data, 32);
        assert_eq!(r.read_line().unwrap(), "kept");
        assert!(matches!(r.read_line(), Err(CacheError::EndOfStream)));
        assert!(r.has_unterminated_line());
    }

    #[test]
    fn test_clean_end_of_stream_is_not_unterminated() {
        let mut r = reader(b"only\n", 32);
        assert_eq!(r.read_line().unwrap(), "only");
        assert!(matches!(r.read_line(), Err(CacheError::EndOfStream)));
        assert!(!r.has_unterminated_line());
    }

    #[test]
    fn test_empty_stream() {
        let mut r = reader(b"", 32);
        assert!(matches!(r.read_line(), Err(CacheError::EndOfStream)));
        assert!(!r.has_unterminated_line());
    }

    #[test]
    fn test_minimum_capacity() {
        let mut r = reader(b"ab\r\ncd\n", 1);
        assert_eq!(read_all(&mut r), vec!["ab", "cd"]);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn test_zero_capacity_panics() {
        let _ = reader(b"", 0);
    }

    #[test]
    fn test_matches_reference_scanner() {
        // Compare against a straightforward split on a mixed workload.
        let data = b"one\ntwo\r\n\nthree33333333333333333333333333333333\r\nfour\n";
        for capacity in [1, 2, 3, 8, 32, 64] {
            let mut r = reader(data, capacity);
            let expected: Vec<String> = String::from_utf8_lossy(data)
                .split('\n')
                .map(|s| s.strip_suffix('\r').unwrap_or(s).to_string())
                .collect();
            // The final empty fragment after the last LF is not a line.
            let expected = &expected[..expected.len() - 1];
            assert_eq!(read_all(&mut r), expected, "capacity {capacity}");
        }
    }
}
