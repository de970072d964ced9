// Tollgate State
// Correlation records for paused reviews, in memory or in SQLite

pub mod database;
pub mod error;
pub mod store;

pub use database::ReviewDb;
pub use error::StateError;
pub use store::{MemoryReviewStore, ReviewStore};
