//! Flag-version names, stage markers, and the tagged sentinel targets.
//!
//! The external flag manager addresses everything by bare strings, with two
//! magic values: `"all"` (delete the entire history) and `"auto"` (rewind to
//! this stage's own before-marker). Here those sentinels are explicit enum
//! variants so a typo'd sentinel cannot be mistaken for a version name.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::Stage;

/// The name of one recorded flag version.
///
/// Names are immutable tokens. A name can be deleted and later recreated,
/// so a name alone does not identify a point in time; its position in the
/// history does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionName(pub String);

impl VersionName {
    pub fn new(s: impl Into<String>) -> Self {
        VersionName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VersionName {
    fn from(s: &str) -> Self {
        VersionName(s.to_string())
    }
}

impl From<String> for VersionName {
    fn from(s: String) -> Self {
        VersionName(s)
    }
}

/// The pair of version names bracketing one stage's execution.
///
/// Markers are derived deterministically from the stage identity and are
/// recomputed on every run; they are never persisted on their own. The
/// presence of `before` in a history is the signal that the stage has
/// already run against that MS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMarkers {
    pub before: VersionName,
    pub after: VersionName,
}

impl StageMarkers {
    /// Derives the markers for a stage: `{prefix}_{name}_before` and
    /// `{prefix}_{name}_after`.
    pub fn for_stage(stage: &Stage) -> Self {
        StageMarkers {
            before: VersionName::new(format!("{}_{}_before", stage.prefix, stage.name)),
            after: VersionName::new(format!("{}_{}_after", stage.prefix, stage.name)),
        }
    }
}

/// Target of a delete operation on a version history.
///
/// Deletion is always a suffix operation: deleting a named version also
/// removes every version recorded after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target", content = "name", rename_all = "snake_case")]
pub enum DeleteTarget {
    /// Remove the entire history.
    All,
    /// Remove this version and everything recorded after it.
    Version(VersionName),
}

impl DeleteTarget {
    /// Parses the flag manager's string convention, where the literal
    /// `"all"` means the whole history.
    pub fn parse(s: &str) -> Self {
        if s == "all" {
            DeleteTarget::All
        } else {
            DeleteTarget::Version(VersionName::new(s))
        }
    }
}

impl fmt::Display for DeleteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteTarget::All => write!(f, "all"),
            DeleteTarget::Version(name) => write!(f, "{}", name),
        }
    }
}

/// Target of a configured rewind.
///
/// `Auto` resolves to the running stage's own before-marker, so one
/// configuration block can be reused across stages and MSs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RewindTarget {
    /// Resolve to the stage's own before-marker at decision time.
    Auto,
    /// An explicitly named version.
    Named(VersionName),
}

impl RewindTarget {
    /// Resolves the target against the markers of the stage making the
    /// decision.
    pub fn resolve(&self, markers: &StageMarkers) -> VersionName {
        match self {
            RewindTarget::Auto => markers.before.clone(),
            RewindTarget::Named(name) => name.clone(),
        }
    }
}

impl Default for RewindTarget {
    fn default() -> Self {
        RewindTarget::Auto
    }
}

impl fmt::Display for RewindTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewindTarget::Auto => write!(f, "auto"),
            RewindTarget::Named(name) => write!(f, "{}", name),
        }
    }
}

// The configuration file writes the target as a plain string, with "auto"
// as the sentinel. Keep that wire shape while exposing tagged variants.
impl Serialize for RewindTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RewindTarget::Auto => serializer.serialize_str("auto"),
            RewindTarget::Named(name) => serializer.serialize_str(name.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for RewindTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(de::Error::custom("rewind version name must not be empty"));
        }
        Ok(if s == "auto" {
            RewindTarget::Auto
        } else {
            RewindTarget::Named(VersionName(s))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::Stage;

    #[test]
    fn markers_are_derived_from_stage_identity() {
        let stage = Stage::new("mypipe", "selfcal");
        let markers = StageMarkers::for_stage(&stage);
        assert_eq!(markers.before.as_str(), "mypipe_selfcal_before");
        assert_eq!(markers.after.as_str(), "mypipe_selfcal_after");
    }

    #[test]
    fn markers_are_deterministic() {
        let stage = Stage::new("p", "flag");
        assert_eq!(
            StageMarkers::for_stage(&stage),
            StageMarkers::for_stage(&stage)
        );
    }

    #[test]
    fn delete_target_parse_recognises_all() {
        assert_eq!(DeleteTarget::parse("all"), DeleteTarget::All);
        assert_eq!(
            DeleteTarget::parse("p_flag_before"),
            DeleteTarget::Version(VersionName::new("p_flag_before"))
        );
    }

    #[test]
    fn rewind_target_auto_resolves_to_before_marker() {
        let markers = StageMarkers::for_stage(&Stage::new("p", "flag"));
        assert_eq!(RewindTarget::Auto.resolve(&markers), markers.before);

        let named = RewindTarget::Named(VersionName::new("p_crosscal_after"));
        assert_eq!(
            named.resolve(&markers),
            VersionName::new("p_crosscal_after")
        );
    }

    #[test]
    fn rewind_target_serde_uses_string_sentinel() {
        let auto: RewindTarget = serde_yaml::from_str("auto").unwrap();
        assert_eq!(auto, RewindTarget::Auto);

        let named: RewindTarget = serde_yaml::from_str("p_flag_before").unwrap();
        assert_eq!(named, RewindTarget::Named(VersionName::new("p_flag_before")));

        assert_eq!(serde_yaml::to_string(&RewindTarget::Auto).unwrap().trim(), "auto");
    }

    #[test]
    fn rewind_target_rejects_empty_name() {
        let result: Result<RewindTarget, _> = serde_yaml::from_str("\"\"");
        assert!(result.is_err());
    }
}
