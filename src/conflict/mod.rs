//! Conflict detection and resolution.

pub mod detector;
pub mod resolution;
pub mod types;

pub use detector::{classify_mapped, find_creation_match, title_similarity, PairOutcome};
pub use resolution::{ConflictResolutionService, ResolutionOutcome};
pub use types::{
    ConflictStatistics, ConflictStatus, ConflictType, MergedEventData, Resolution, SyncConflict,
};
