pub mod health;
pub mod members;
pub mod metrics;
pub mod notifications;
pub mod ping;
pub mod teams;
pub mod websocket;
