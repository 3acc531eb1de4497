// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod error;
pub mod events;
pub mod ingest;
pub mod item;
pub mod persist;
pub mod store;
pub mod tracker;

// ---- Re-exports for stable public API ----
pub use crate::events::{ChangeAction, ChangeBus, ChangeEvent};
pub use crate::ingest::config::TrackerConfig;
pub use crate::item::{Item, ItemSource};
pub use crate::store::{StoryStore, SweepReport};
pub use crate::tracker::BoundedTracker;
