use std::io::{IsTerminal, Write};
use std::time::Duration;

/// Permission state of the OS notification capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Never asked.
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsNotification {
    pub title: String,
    pub body: String,
    /// Notifications sharing a tag replace each other.
    pub tag: String,
    pub auto_close: Option<Duration>,
}

/// OS-level notification capability. Display is best-effort: callers log
/// failures and carry on.
pub trait Notifier {
    fn permission(&self) -> Permission;

    /// Only call this right after a user action (joining a team, opening a view
    /// for a confirmed identity).
    fn request_permission(&mut self) -> Permission;

    fn show(&mut self, notification: &OsNotification) -> anyhow::Result<()>;
}

/// Rings the terminal bell and prints the notification on stderr.
///
/// Permission is granted when stderr is an interactive terminal; once decided
/// it is not asked again.
pub struct TerminalNotifier {
    permission: Permission,
}

impl TerminalNotifier {
    pub fn new() -> Self {
        Self {
            permission: Permission::Default,
        }
    }
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TerminalNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        if self.permission == Permission::Default {
            self.permission = if std::io::stderr().is_terminal() {
                Permission::Granted
            } else {
                Permission::Denied
            };
            tracing::debug!("Notification permission: {:?}", self.permission);
        }
        self.permission
    }

    fn show(&mut self, notification: &OsNotification) -> anyhow::Result<()> {
        if self.permission != Permission::Granted {
            tracing::warn!(
                "Notification permission not granted ({:?}), skipping {}",
                self.permission,
                notification.tag
            );
            return Ok(());
        }
        let mut err = std::io::stderr().lock();
        write!(err, "\x07")?;
        writeln!(err, "{} {}", notification.title, notification.body)?;
        err.flush()?;
        Ok(())
    }
}
