//! Team and member management.

mod members;
mod teams;

pub use members::MemberService;
pub use teams::TeamService;
