//! Commands a member understands.

use std::fmt;
use std::str::FromStr;

/// Command verb, written as the last segment of `/command/<host>/<verb>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Run the consistency check of every entry
    State,
    /// Reconcile every entry, then re-check
    Apply,
}

impl Verb {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Apply => "apply",
        }
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state" => Ok(Self::State),
            "apply" => Ok(Self::Apply),
            other => Err(format!("Unknown command: {other}")),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
