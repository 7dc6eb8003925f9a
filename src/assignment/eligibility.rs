//! Reviewer eligibility.

use std::collections::HashSet;

use crate::models::Member;

/// Active members not in `exclude`, ordered by name then id.
pub fn eligible_candidates(members: &[Member], exclude: &HashSet<&str>) -> Vec<Member> {
    let mut candidates: Vec<Member> = members
        .iter()
        .filter(|m| m.active && !exclude.contains(m.id.as_str()))
        .cloned()
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    candidates
}
