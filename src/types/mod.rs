//! Core domain types for flag-version gating.
//!
//! This module contains the fundamental types used throughout the crate,
//! designed to encode invariants via the type system.

pub mod ids;
pub mod version;

// Re-export commonly used types at the module level
pub use ids::{MsName, Stage};
pub use version::{DeleteTarget, RewindTarget, StageMarkers, VersionName};
