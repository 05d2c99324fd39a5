//! Matchers over tokenized watch-uids data lines.

use std::fmt;

use uidwatch_types::WatchCommand;

use crate::line::RawLine;

/// An expected line shape: a command plus optional procstate and
/// capability.
///
/// [`test`](Self::test) is a pure function, so predicates can be checked
/// against captured lines without a running watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchUidPredicate {
    command: WatchCommand,
    procstate: Option<String>,
    capability: Option<u32>,
}

/// Builder for [`WatchUidPredicate`].
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    command: WatchCommand,
    procstate: Option<String>,
    capability: Option<u32>,
}

impl PredicateBuilder {
    /// Set the expected procstate label.
    #[must_use]
    pub fn procstate(mut self, procstate: impl Into<String>) -> Self {
        self.procstate = Some(procstate.into());
        self
    }

    /// Set the expected procstate label, or clear it with `None`.
    #[must_use]
    pub fn maybe_procstate(mut self, procstate: Option<&str>) -> Self {
        self.procstate = procstate.map(str::to_string);
        self
    }

    /// Set the expected process capability bitmask.
    #[must_use]
    pub fn capability(mut self, capability: u32) -> Self {
        self.capability = Some(capability);
        self
    }

    #[must_use]
    pub fn maybe_capability(mut self, capability: Option<u32>) -> Self {
        self.capability = capability;
        self
    }

    pub fn build(self) -> WatchUidPredicate {
        WatchUidPredicate {
            command: self.command,
            procstate: self.procstate,
            capability: self.capability,
        }
    }
}

impl WatchUidPredicate {
    /// Match any line of `command`.
    pub fn new(command: WatchCommand) -> Self {
        Self::builder(command).build()
    }

    pub fn builder(command: WatchCommand) -> PredicateBuilder {
        PredicateBuilder {
            command,
            procstate: None,
            capability: None,
        }
    }

    pub fn command(&self) -> WatchCommand {
        self.command
    }

    pub fn procstate(&self) -> Option<&str> {
        self.procstate.as_deref()
    }

    pub fn capability(&self) -> Option<u32> {
        self.capability
    }

    /// Whether `line` has this predicate's shape.
    ///
    /// The command field must match. With neither procstate nor capability
    /// set that is enough. For `procstate` lines the procstate (field 2)
    /// and capability (field 6, compared as decimal text) must match
    /// whichever of them is set. For every other command only a procstate
    /// can match, against field 2. Missing fields never match.
    pub fn test(&self, line: &RawLine) -> bool {
        if line.command() != Some(self.command.as_str()) {
            return false;
        }
        let procstate_ok = |expected: &str| line.procstate() == Some(expected);
        let capability_ok =
            |expected: u32| line.capability() == Some(expected.to_string().as_str());

        match (&self.procstate, self.capability) {
            (None, None) => true,
            _ if self.command != WatchCommand::Procstate => {
                self.procstate.as_deref().is_some_and(procstate_ok)
            }
            (Some(state), Some(cap)) => procstate_ok(state.as_str()) && capability_ok(cap),
            (Some(state), None) => procstate_ok(state.as_str()),
            (None, Some(cap)) => capability_ok(cap),
        }
    }
}

impl fmt::Display for WatchUidPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd={}", self.command)?;
        match &self.procstate {
            Some(state) => write!(f, " procState={state}")?,
            None => write!(f, " procState=None")?,
        }
        match self.capability {
            Some(cap) => write!(f, " capability={cap}"),
            None => write!(f, " capability=None"),
        }
    }
}
