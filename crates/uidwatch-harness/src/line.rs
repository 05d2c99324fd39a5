//! Tokenizing and classifying watcher output lines.
//!
//! A line starting with `#` is a comment: it is kept whole as a single
//! token and only ever logged. Every other line is split on runs of
//! whitespace into fields.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use uidwatch_types::{CAPABILITY_INDEX, CMD_INDEX, MIN_DATA_FIELDS, PROCSTATE_INDEX, UID_INDEX};

fn space_splitter() -> &'static Regex {
    static SPLITTER: OnceLock<Regex> = OnceLock::new();
    SPLITTER.get_or_init(|| Regex::new(r"\s+").expect("hardcoded regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    Data,
}

/// One line of watcher output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    tokens: Vec<String>,
    kind: LineKind,
}

/// How the reader treats a parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    /// Pass through to the log.
    Comment,
    /// Subject to matching.
    Data,
    /// Fewer than the minimum number of fields; dropped.
    TooShort,
    /// Reports a different uid; dropped.
    OtherUid,
}

impl RawLine {
    pub fn parse(text: &str) -> Self {
        if text.starts_with('#') {
            return Self {
                tokens: vec![text.to_string()],
                kind: LineKind::Comment,
            };
        }
        let trimmed = text.trim();
        let tokens = if trimmed.is_empty() {
            Vec::new()
        } else {
            space_splitter()
                .split(trimmed)
                .map(str::to_string)
                .collect()
        };
        Self {
            tokens,
            kind: LineKind::Data,
        }
    }

    /// Build a data line from already-split fields.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        let kind = match tokens.as_slice() {
            [only] if only.starts_with('#') => LineKind::Comment,
            _ => LineKind::Data,
        };
        Self { tokens, kind }
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }

    pub fn is_comment(&self) -> bool {
        self.kind == LineKind::Comment
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    pub fn uid(&self) -> Option<&str> {
        self.data_field(UID_INDEX)
    }

    pub fn command(&self) -> Option<&str> {
        self.data_field(CMD_INDEX)
    }

    pub fn procstate(&self) -> Option<&str> {
        self.data_field(PROCSTATE_INDEX)
    }

    pub fn capability(&self) -> Option<&str> {
        self.data_field(CAPABILITY_INDEX)
    }

    fn data_field(&self, index: usize) -> Option<&str> {
        match self.kind {
            LineKind::Data => self.field(index),
            LineKind::Comment => None,
        }
    }

    /// Decide what the reader does with this line when watching `subject`.
    pub fn classify(&self, subject: &str) -> Classified {
        match self.kind {
            LineKind::Comment => Classified::Comment,
            LineKind::Data if self.tokens.len() < MIN_DATA_FIELDS => Classified::TooShort,
            LineKind::Data if self.tokens[UID_INDEX] != subject => Classified::OtherUid,
            LineKind::Data => Classified::Data,
        }
    }
}

impl fmt::Display for RawLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tokens.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_runs() {
        let line = RawLine::parse("10123  procstate\tTOP 0 0   0 15");
        assert_eq!(line.kind(), LineKind::Data);
        assert_eq!(line.len(), 7);
        assert_eq!(line.uid(), Some("10123"));
        assert_eq!(line.command(), Some("procstate"));
        assert_eq!(line.procstate(), Some("TOP"));
        assert_eq!(line.capability(), Some("15"));
    }

    #[test]
    fn comment_kept_whole() {
        let line = RawLine::parse("# uid 10123 observer registered");
        assert!(line.is_comment());
        assert_eq!(line.len(), 1);
        assert_eq!(line.field(0), Some("# uid 10123 observer registered"));
        assert_eq!(line.command(), None);
        assert_eq!(line.classify("10123"), Classified::Comment);
    }

    #[test]
    fn leading_whitespace_does_not_produce_empty_field() {
        let line = RawLine::parse("   10123 gone  ");
        assert_eq!(line.tokens(), &["10123".to_string(), "gone".to_string()]);
    }

    #[test]
    fn classification() {
        assert_eq!(RawLine::parse("10123").classify("10123"), Classified::TooShort);
        assert_eq!(RawLine::parse("").classify("10123"), Classified::TooShort);
        assert_eq!(
            RawLine::parse("10124 active").classify("10123"),
            Classified::OtherUid
        );
        assert_eq!(
            RawLine::parse("10123 active").classify("10123"),
            Classified::Data
        );
    }

    #[test]
    fn from_tokens_detects_single_comment_token() {
        assert!(RawLine::from_tokens(&["#note"]).is_comment());
        assert!(!RawLine::from_tokens(&["10123", "#x"]).is_comment());
    }

    #[test]
    fn display_matches_array_rendering() {
        let line = RawLine::from_tokens(&["10123", "procstate", "TOP"]);
        assert_eq!(line.to_string(), "[10123, procstate, TOP]");
    }

    #[test]
    fn missing_fields_are_none() {
        let line = RawLine::parse("10123 gone");
        assert_eq!(line.procstate(), None);
        assert_eq!(line.capability(), None);
    }
}
