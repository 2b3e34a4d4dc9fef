pub mod member;
pub mod notification;
pub mod team;
