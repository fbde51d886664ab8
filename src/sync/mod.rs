//! The synchronization pipeline: plan, then apply.
//!
//! A pass fetches both sides, builds a [`plan::SyncPlan`] purely in memory,
//! then applies each delta through the provider client and the local store.
//! Anything the planner cannot safely decide becomes a conflict instead of
//! a delta.

pub mod delta;
pub mod engine;
pub mod plan;
pub mod retry;

pub use delta::{DeltaCounts, DeltaDirection, DeltaKind, SyncDelta};
pub use engine::{SyncEngine, SyncResult, SyncSummary};
pub use plan::{build_plan, SyncPlan};
pub use retry::with_retry;
