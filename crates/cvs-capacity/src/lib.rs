//! # cvs-capacity
//!
//! Capacity planning and resize decisions for Cloud Volumes Service volumes.
//!
//! - [`tier`]: service levels, throughput, API/UI label translation
//! - [`planner`]: dynamic and static-margin sizing
//! - [`volume`]: the volume record and the [`VolumeClient`] seam
//! - [`engine`]: per-volume decisions and their execution
//!
//! ```text
//! VolumeClient::list ──► ResizeDecisionEngine ──► plan_capacity ──► Decision
//!                                │                                     │
//!                                └──────── VolumeClient::patch ◄───────┘
//!                                           (ResizeProposed, not dry-run)
//! ```
//!
//! # Example
//!
//! ```
//! use cvs_capacity::{Policy, planner::GIB, static_margin_capacity};
//!
//! assert_eq!(static_margin_capacity(80 * GIB, 20).unwrap(), 100 * GIB);
//! let policy = Policy::new(60, 20, true).unwrap();
//! assert!(policy.dry_run());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod planner;
pub mod policy;
pub mod tier;
pub mod volume;

pub use engine::{
    Action, Decision, Notice, ResizeDecisionEngine, Severity, SkipReason, VolumeReport,
    percent_used,
};
pub use error::{CapacityError, Result};
pub use planner::{
    GIB, MAX_VOLUME_BYTES, TIB, calculate_new_capacity, plan_capacity, static_margin_capacity,
};
pub use policy::{MAX_MARGIN_PERCENT, Policy, SizingMode};
pub use tier::{ServiceLevel, api_to_ui, effective_tier, throughput_for, ui_to_api};
pub use volume::{
    ALL_REGIONS, FieldChanges, InMemoryVolumeClient, PatchCall, Volume, VolumeClient,
    quota_change,
};
