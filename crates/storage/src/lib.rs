pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStore};
pub use record::{ResultMemo, StateTransitionLogEntry};
pub use traits::{CheckStore, LIVE_BASTION_WINDOW};
