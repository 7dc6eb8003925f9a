//! Reviewer assignment.
//!
//! Eligibility is a pure filter, randomness sits behind a narrow picker
//! trait, and [`AssignmentEngine`] ties both to the store.

mod eligibility;
mod engine;
mod picker;

pub use engine::AssignmentEngine;
pub use picker::{picker_from_seed, ReviewerPicker};
