pub mod customer;
pub mod invoice;
pub mod job;
pub mod tag;
pub mod team;
pub mod team_invite;
pub mod user;
