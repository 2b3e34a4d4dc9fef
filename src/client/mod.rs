//! Client side of Next Speaker: the identity cache, the feed watcher, the
//! alert cycle and the HTTP client the terminal app is built from.

pub mod alert;
pub mod api;
pub mod notifier;
pub mod sent;
pub mod session;
pub mod view;
pub mod watcher;
