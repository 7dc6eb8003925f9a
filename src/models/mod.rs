//! Data models for the reviewer backend.
//!
//! Pure data plus invariant checks; nothing here touches the database.

mod member;
mod review;
mod task;
mod team;

pub use member::*;
pub use review::*;
pub use task::*;
pub use team::*;
