//! The event-category vocabulary of the `am watch-uids` line protocol.
//!
//! Every data line reported by the watcher has the shape
//! `<uid> <command> [<procstate> ... <capability>]`. The command field is
//! one of a small fixed set of words, modelled here as [`WatchCommand`].

use std::fmt;
use std::str::FromStr;

use crate::UidWatchError;

/// Index of the subject uid in a tokenized data line.
pub const UID_INDEX: usize = 0;
/// Index of the command word in a tokenized data line.
pub const CMD_INDEX: usize = 1;
/// Index of the procstate label in a tokenized `procstate` line.
pub const PROCSTATE_INDEX: usize = 2;
/// Index of the capability value in a tokenized `procstate` line.
pub const CAPABILITY_INDEX: usize = 6;
/// Data lines shorter than this are dropped by the reader.
pub const MIN_DATA_FIELDS: usize = 2;

/// A uid state-change category reported by `am watch-uids`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchCommand {
    Procstate,
    Active,
    Idle,
    Uncached,
    Cached,
    Gone,
    Capability,
}

impl WatchCommand {
    /// All commands in protocol code order.
    pub const ALL: [WatchCommand; 7] = [
        WatchCommand::Procstate,
        WatchCommand::Active,
        WatchCommand::Idle,
        WatchCommand::Uncached,
        WatchCommand::Cached,
        WatchCommand::Gone,
        WatchCommand::Capability,
    ];

    /// The word printed in the command field.
    pub fn as_str(self) -> &'static str {
        match self {
            WatchCommand::Procstate => "procstate",
            WatchCommand::Active => "active",
            WatchCommand::Idle => "idle",
            WatchCommand::Uncached => "uncached",
            WatchCommand::Cached => "cached",
            WatchCommand::Gone => "gone",
            WatchCommand::Capability => "capability",
        }
    }

    /// Numeric code used by callers that still address commands by index.
    pub fn code(self) -> u8 {
        match self {
            WatchCommand::Procstate => 0,
            WatchCommand::Active => 1,
            WatchCommand::Idle => 2,
            WatchCommand::Uncached => 3,
            WatchCommand::Cached => 4,
            WatchCommand::Gone => 5,
            WatchCommand::Capability => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

impl fmt::Display for WatchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchCommand {
    type Err = UidWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.as_str() == s)
            .ok_or_else(|| {
                UidWatchError::ParseError(format!(
                    "unknown watch command {s:?} (expected one of: procstate, active, idle, \
                     uncached, cached, gone, capability)"
                ))
            })
    }
}
