//! Local progress store.
//!
//! Per-category dhikr counters and completion flags, the masbaha session
//! counter and lifetime total, and the language preference. Everything is
//! plain key-value underneath; unreadable entries degrade to empty
//! progress instead of errors.

mod storage;
mod store;
mod tally;

pub use storage::{ProgressStorage, SqliteProgress};
pub use store::{CategoryProgress, ItemProgress, ProgressEvent, ProgressStore};
pub use tally::{Milestone, Tally, TallyTap};
