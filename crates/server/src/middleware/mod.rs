pub mod auth;
pub mod team;

pub use auth::{AuthUser, require_user};
pub use team::{TeamContext, require_team};
