//! Parser for `key=value` diagnostic dumps.
//!
//! Grammar, applied line by line:
//!
//! ```text
//! dump   := line*
//! line   := ws* (pair | word) (ws+ (pair | word))* ws*
//! pair   := key '=' value
//! key    := [A-Za-z0-9_.\-]+
//! value  := non-whitespace*
//! ```
//!
//! Words that are not pairs are ignored, as are lines without any pair.
//! When a key repeats, every occurrence is kept in order and
//! [`DumpRecord::get`] returns the last one.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use uidwatch_types::UidWatchError;

fn pair_pattern() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| {
        Regex::new(r"(?:^|\s)([A-Za-z0-9_.\-]+)=(\S*)").expect("hardcoded regex")
    })
}

/// One `key=value` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    pub key: String,
    pub value: String,
    /// Zero-based line number the pair was found on.
    pub line: usize,
}

/// All pairs found in a dump, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpRecord {
    entries: Vec<DumpEntry>,
}

impl DumpRecord {
    pub fn entries(&self) -> &[DumpEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.key == key)
            .map(|e| e.value.as_str())
            .collect()
    }

    /// Last value for `key`, parsed. `Ok(None)` when the key is absent.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, UidWatchError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    UidWatchError::ParseError(format!("dump value {key}={raw:?}: {e}"))
                })
            })
            .transpose()
    }
}

/// Extract every `key=value` pair from `text`.
pub fn parse_dump(text: &str) -> DumpRecord {
    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        for caps in pair_pattern().captures_iter(line) {
            entries.push(DumpEntry {
                key: caps[1].to_string(),
                value: caps[2].to_string(),
                line: line_no,
            });
        }
    }
    DumpRecord { entries }
}

/// Current value of a setting in `dumpsys activity settings` style output.
///
/// Only lines containing ` key=` are considered; the value is everything
/// after the first `=` following the key, trimmed. The last such line wins.
pub fn find_setting<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!(" {key}=");
    text.lines()
        .filter_map(|line| {
            let at = line.find(&needle)?;
            Some(line[at + needle.len()..].trim())
        })
        .last()
}
