//! flaggate - flag-version history, rewind, and conflict gating for
//! Measurement Set pipelines.
//!
//! Pipeline stages mutate the FLAG column of one or more MSs through an
//! external flag manager that can capture, restore, and delete named
//! snapshots ("flag versions"). Because stages can be re-run, re-ordered,
//! or partially repeated, every stage must pass a gate before it may touch
//! an MS: the gate inspects the MS's recorded version history, decides
//! whether running is safe (possibly after rewinding to an earlier
//! version), and refuses with an operator-facing remediation message when
//! it is not.
//!
//! The crate is organised around three layers:
//!
//! - [`history`] / [`store`]: the per-MS ordered version history and its
//!   sidecar-manifest persistence;
//! - [`resolver`]: the pure decision function consulted before any
//!   mutation;
//! - [`gate`] / [`commands`]: the bracketing API that turns decisions into
//!   queued flag-manager commands, committed only when the plan is
//!   flushed through an executor.

pub mod commands;
pub mod config;
pub mod gate;
pub mod history;
pub mod resolver;
pub mod store;
pub mod types;
