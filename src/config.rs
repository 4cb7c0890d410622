//! The `rewind_flags` configuration block.
//!
//! Each stage of the pipeline carries a block of this shape in its
//! configuration:
//!
//! ```yaml
//! rewind_flags:
//!   enable: true
//!   mode: rewind_to_version      # or reset_stage
//!   version: auto                # or an explicit version name
//!   overwrite_flag_versions: false
//! ```
//!
//! On the wire, `mode` and `version` are separate keys (and `version` is
//! ignored in `reset_stage` mode); in memory the mode carries its target so
//! an unset target cannot be observed.

use serde::{Deserialize, Serialize};

use crate::types::{RewindTarget, StageMarkers, VersionName};

/// What a rewind, if enabled, should rewind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewindMode {
    /// Rewind to this stage's own before-marker. Harmless if that marker
    /// does not exist yet: the stage simply proceeds as a fresh run.
    ResetStage,
    /// Rewind to a configured version. Missing targets are a hard stop,
    /// because the operator asked for a specific point in the history.
    ToVersion(RewindTarget),
}

/// A stage's rewind/overwrite policy, consulted before the stage is allowed
/// to mutate an MS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewindSpec {
    /// Whether a rewind was requested at all.
    pub enable: bool,
    /// The rewind mode, with its target.
    pub mode: RewindMode,
    /// Whether existing flag versions may be overwritten (moved to the tail
    /// of the history with fresh content).
    pub overwrite: bool,
}

impl RewindSpec {
    /// The policy of a stage with no `rewind_flags` block: no rewind, no
    /// overwriting.
    pub fn disabled() -> Self {
        RewindSpec {
            enable: false,
            mode: RewindMode::ResetStage,
            overwrite: false,
        }
    }

    /// A reset-to-own-before-marker rewind.
    pub fn reset_stage() -> Self {
        RewindSpec {
            enable: true,
            mode: RewindMode::ResetStage,
            overwrite: false,
        }
    }

    /// A rewind to an explicit target.
    pub fn rewind_to(target: RewindTarget) -> Self {
        RewindSpec {
            enable: true,
            mode: RewindMode::ToVersion(target),
            overwrite: false,
        }
    }

    /// Returns the spec with the overwrite policy set.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// The rewind target this spec resolves to for a given stage, if a
    /// rewind is requested at all.
    pub fn resolved_target(&self, markers: &StageMarkers) -> Option<VersionName> {
        if !self.enable {
            return None;
        }
        Some(match &self.mode {
            RewindMode::ResetStage => markers.before.clone(),
            RewindMode::ToVersion(target) => target.resolve(markers),
        })
    }

    /// Returns the spec with the rewind target replaced, keeping the rest
    /// of the block.
    ///
    /// Some stages read their target from a differently named configuration
    /// key (the original pipeline has `transfer_apply_gains_version` and
    /// `mstransform_version` next to the plain `version`); those callers
    /// resolve the key themselves and inject the target here.
    pub fn with_target(mut self, target: RewindTarget) -> Self {
        if let RewindMode::ToVersion(_) = self.mode {
            self.mode = RewindMode::ToVersion(target);
        }
        self
    }
}

impl Default for RewindSpec {
    fn default() -> Self {
        RewindSpec::disabled()
    }
}

// ─── Wire shape ───

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
enum RawMode {
    // `reset_worker` is the spelling used by older configuration files.
    #[default]
    #[serde(alias = "reset_worker")]
    ResetStage,
    RewindToVersion,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawRewindFlags {
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    mode: RawMode,
    #[serde(default)]
    version: RewindTarget,
    #[serde(default)]
    overwrite_flag_versions: bool,
}

impl From<RawRewindFlags> for RewindSpec {
    fn from(raw: RawRewindFlags) -> Self {
        let mode = match raw.mode {
            RawMode::ResetStage => RewindMode::ResetStage,
            RawMode::RewindToVersion => RewindMode::ToVersion(raw.version),
        };
        RewindSpec {
            enable: raw.enable,
            mode,
            overwrite: raw.overwrite_flag_versions,
        }
    }
}

impl From<&RewindSpec> for RawRewindFlags {
    fn from(spec: &RewindSpec) -> Self {
        let (mode, version) = match &spec.mode {
            RewindMode::ResetStage => (RawMode::ResetStage, RewindTarget::Auto),
            RewindMode::ToVersion(target) => (RawMode::RewindToVersion, target.clone()),
        };
        RawRewindFlags {
            enable: spec.enable,
            mode,
            version,
            overwrite_flag_versions: spec.overwrite,
        }
    }
}

impl Serialize for RewindSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawRewindFlags::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RewindSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawRewindFlags::deserialize(deserializer).map(RewindSpec::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VersionName;

    #[test]
    fn default_is_disabled() {
        let spec = RewindSpec::default();
        assert!(!spec.enable);
        assert!(!spec.overwrite);
        assert_eq!(spec.mode, RewindMode::ResetStage);
    }

    #[test]
    fn parses_reset_stage_block() {
        let spec: RewindSpec = serde_yaml::from_str(
            "enable: true\n\
             mode: reset_stage\n",
        )
        .unwrap();
        assert!(spec.enable);
        assert_eq!(spec.mode, RewindMode::ResetStage);
        assert!(!spec.overwrite);
    }

    #[test]
    fn parses_rewind_to_named_version() {
        let spec: RewindSpec = serde_yaml::from_str(
            "enable: true\n\
             mode: rewind_to_version\n\
             version: p_crosscal_before\n\
             overwrite_flag_versions: true\n",
        )
        .unwrap();
        assert_eq!(
            spec.mode,
            RewindMode::ToVersion(RewindTarget::Named(VersionName::new("p_crosscal_before")))
        );
        assert!(spec.overwrite);
    }

    #[test]
    fn accepts_legacy_reset_worker_spelling() {
        let spec: RewindSpec = serde_yaml::from_str(
            "enable: true\n\
             mode: reset_worker\n",
        )
        .unwrap();
        assert_eq!(spec.mode, RewindMode::ResetStage);
    }

    #[test]
    fn version_defaults_to_auto() {
        let spec: RewindSpec = serde_yaml::from_str(
            "enable: true\n\
             mode: rewind_to_version\n",
        )
        .unwrap();
        assert_eq!(spec.mode, RewindMode::ToVersion(RewindTarget::Auto));
    }

    #[test]
    fn version_is_ignored_in_reset_mode() {
        let spec: RewindSpec = serde_yaml::from_str(
            "enable: true\n\
             mode: reset_stage\n\
             version: p_flag_before\n",
        )
        .unwrap();
        assert_eq!(spec.mode, RewindMode::ResetStage);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<RewindSpec, _> = serde_yaml::from_str("enabled: true\n");
        assert!(result.is_err());
    }

    #[test]
    fn serde_roundtrip_preserves_spec() {
        for spec in [
            RewindSpec::disabled(),
            RewindSpec::reset_stage().with_overwrite(true),
            RewindSpec::rewind_to(RewindTarget::Auto),
            RewindSpec::rewind_to(RewindTarget::Named(VersionName::new("p_flag_after"))),
        ] {
            let yaml = serde_yaml::to_string(&spec).unwrap();
            let parsed: RewindSpec = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(parsed, spec);
        }
    }

    #[test]
    fn with_target_replaces_only_rewind_targets() {
        let named = RewindTarget::Named(VersionName::new("p_transform_before"));
        let spec = RewindSpec::rewind_to(RewindTarget::Auto).with_target(named.clone());
        assert_eq!(spec.mode, RewindMode::ToVersion(named.clone()));

        // Reset mode has no target to replace.
        let spec = RewindSpec::reset_stage().with_target(named);
        assert_eq!(spec.mode, RewindMode::ResetStage);
    }
}
