//! Journal operation lines: parsing and encoding.

use crate::error::{CacheError, Result};

const CLEAN: &str = "CLEAN";
const DIRTY: &str = "DIRTY";
const READ: &str = "READ";
const REMOVE: &str = "REMOVE";

/// One state-transition line in the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalRecord {
    /// An edit is in flight for `key`.
    Dirty {
        /// Entry key.
        key: String,
    },
    /// A full value set was published for `key`, with one byte length per index.
    Clean {
        /// Entry key.
        key: String,
        /// Committed byte length of each value.
        lengths: Vec<u64>,
    },
    /// `key` was read, promoting it in the LRU order.
    Read {
        /// Entry key.
        key: String,
    },
    /// `key` was deleted.
    Remove {
        /// Entry key.
        key: String,
    },
}

impl JournalRecord {
    /// Parse a single journal body line.
    ///
    /// Any deviation from the grammar, an unknown verb, a separator in a
    /// keyed-only line, or a non-decimal length, is a corrupt journal.
    pub fn parse(line: &str) -> Result<Self> {
        let corrupt = || CacheError::corrupt(format!("unexpected journal line: {line}"));

        let (verb, rest) = line.split_once(' ').ok_or_else(corrupt)?;
        match verb {
            CLEAN => {
                let (key, lengths) = rest.split_once(' ').ok_or_else(corrupt)?;
                let lengths = lengths
                    .split(' ')
                    .map(|field| parse_length(field).ok_or_else(corrupt))
                    .collect::<Result<Vec<u64>>>()?;
                Ok(JournalRecord::Clean {
                    key: key.to_string(),
                    lengths,
                })
            }
            DIRTY if !rest.contains(' ') => Ok(JournalRecord::Dirty {
                key: rest.to_string(),
            }),
            READ if !rest.contains(' ') => Ok(JournalRecord::Read {
                key: rest.to_string(),
            }),
            REMOVE if !rest.contains(' ') => Ok(JournalRecord::Remove {
                key: rest.to_string(),
            }),
            _ => Err(corrupt()),
        }
    }

    /// Encode this record as a journal line, without the trailing LF.
    pub fn encode(&self) -> String {
        match self {
            JournalRecord::Dirty { key } => format!("{DIRTY} {key}"),
            JournalRecord::Clean { key, lengths } => {
                let mut line = format!("{CLEAN} {key}");
                for length in lengths {
                    line.push(' ');
                    line.push_str(&length.to_string());
                }
                line
            }
            JournalRecord::Read { key } => format!("{READ} {key}"),
            JournalRecord::Remove { key } => format!("{REMOVE} {key}"),
        }
    }
}

/// Parse an unsigned decimal length: ASCII digits only, no sign.
fn parse_length(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dirty() {
        assert_eq!(
            JournalRecord::parse("DIRTY k1").unwrap(),
            JournalRecord::Dirty {
                key: "k1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_clean_with_lengths() {
        assert_eq!(
            JournalRecord::parse("CLEAN k1 3 2").unwrap(),
            JournalRecord::Clean {
                key: "k1".to_string(),
                lengths: vec![3, 2]
            }
        );
    }

    #[test]
    fn test_parse_read_and_remove() {
        assert_eq!(
            JournalRecord::parse("READ k1").unwrap(),
            JournalRecord::Read {
                key: "k1".to_string()
            }
        );
        assert_eq!(
            JournalRecord::parse("REMOVE k1").unwrap(),
            JournalRecord::Remove {
                key: "k1".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_verb_is_corrupt() {
        assert!(matches!(
            JournalRecord::parse("SHOUT k1"),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn test_missing_separator_is_corrupt() {
        assert!(matches!(
            JournalRecord::parse("DIRTY"),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn test_extra_field_on_keyed_line_is_corrupt() {
        assert!(matches!(
            JournalRecord::parse("READ k1 extra"),
            Err(CacheError::Corrupt(_))
        ));
        assert!(matches!(
            JournalRecord::parse("REMOVE k1 0"),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn test_clean_without_lengths_is_corrupt() {
        assert!(matches!(
            JournalRecord::parse("CLEAN k1"),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn test_non_decimal_length_is_corrupt() {
        for line in ["CLEAN k1 x 2", "CLEAN k1 -1 2", "CLEAN k1 +3 2", "CLEAN k1  2"] {
            assert!(
                matches!(JournalRecord::parse(line), Err(CacheError::Corrupt(_))),
                "line {line:?} should be corrupt"
            );
        }
    }

    #[test]
    fn test_encode_round_trip() {
        let records = [
            JournalRecord::Dirty {
                key: "a-b_c".to_string(),
            },
            JournalRecord::Clean {
                key: "k".to_string(),
                lengths: vec![0, 1024],
            },
            JournalRecord::Read {
                key: "k".to_string(),
            },
            JournalRecord::Remove {
                key: "k".to_string(),
            },
        ];
        for record in records {
            assert_eq!(JournalRecord::parse(&record.encode()).unwrap(), record);
        }
    }
}
