//! # confirma-legacy
//!
//! Access to the clinic's scheduling database: the read-only appointment
//! feed view and the legacy agenda table that holds confirmation state.

pub mod agenda;
pub mod feed;
mod pool;

pub use agenda::SqlAgenda;
pub use feed::{FeedRow, SqlFeed};
pub use pool::connect;
