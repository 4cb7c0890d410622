//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifier kinds
//! (e.g., using a version name where an MS name is expected) and make the
//! code more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The name of a Measurement Set, relative to the pipeline's MS directory.
///
/// The MS is the resource whose FLAG column is versioned. This core never
/// creates or destroys the MS itself, only the version history attached
/// to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsName(pub String);

impl MsName {
    pub fn new(s: impl Into<String>) -> Self {
        MsName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MsName {
    fn from(s: &str) -> Self {
        MsName(s.to_string())
    }
}

impl From<String> for MsName {
    fn from(s: String) -> Self {
        MsName(s)
    }
}

/// A pipeline stage identity: the pipeline-wide prefix plus the stage's
/// configured name.
///
/// The stage name is what operators change (by appending `__2`, `__3`, ...)
/// when they want a re-run to record flags under fresh version names instead
/// of colliding with a previous run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stage {
    /// The pipeline prefix shared by every stage of one pipeline run.
    pub prefix: String,
    /// The stage's name as it appears in the configuration file.
    pub name: String,
}

impl Stage {
    pub fn new(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Stage {
            prefix: prefix.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.prefix, self.name)
    }
}
