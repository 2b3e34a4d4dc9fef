pub mod live;
pub mod members;
pub mod metrics;
pub mod notifications;
pub mod teams;
