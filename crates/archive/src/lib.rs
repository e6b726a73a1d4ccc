//! Durable archive of raw check results and point-in-time check snapshots.
//!
//! The archive is a blob collaborator, not the source of truth: each key
//! holds at most one object and writes overwrite in place. The engine
//! writes the latest result per `(check, bastion)` after every processed
//! message, and a snapshot of the whole check keyed by the transition log
//! entry id after every confirmed state change, so alert rendering and
//! audit can reconstruct what the check looked like at the moment it
//! transitioned.

mod error;
mod memory;
mod snapshot;
mod traits;

pub use error::ArchiveError;
pub use memory::MemoryArchive;
pub use snapshot::CheckSnapshot;
pub use traits::ResultArchive;
