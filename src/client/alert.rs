//! The flash/notification state machine driven by fresh pings.

use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use super::notifier::{Notifier, OsNotification};
use crate::{models::notification::FeedNotification, palette::Hsl};

/// Timing knobs of the alert cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// How long a flash stays visible when its timer fires normally.
    pub flash_duration: Duration,
    /// Signals arriving this soon after activation are folded into the
    /// running flash. Never longer than `stuck_after`.
    pub coalesce_window: Duration,
    /// A flash still active after this long is considered stuck and is reset.
    pub stuck_after: Duration,
    pub watchdog_interval: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            flash_duration: Duration::from_millis(3500),
            coalesce_window: Duration::from_secs(4),
            stuck_after: Duration::from_secs(5),
            watchdog_interval: Duration::from_secs(1),
        }
    }
}

impl AlertPolicy {
    /// Effective coalescing window: a stuck flash is never kept alive by it.
    pub fn drop_window(&self) -> Duration {
        self.coalesce_window.min(self.stuck_after)
    }
}

/// What a view renders for the flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flash {
    pub active: bool,
    pub color: Hsl,
}

impl Flash {
    pub const NEUTRAL: Flash = Flash {
        active: false,
        color: Hsl::NEUTRAL,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Idle,
    Active { since: Instant, deadline: Instant },
}

/// One alert cycle's worth of fresh pings for the local member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub team_name: String,
    pub recipient: Uuid,
    /// `#RRGGBB` display color of the recipient.
    pub recipient_color: String,
    pub count: usize,
}

impl Alert {
    pub fn new(team_name: &str, recipient: Uuid, recipient_color: &str, fresh: &[FeedNotification]) -> Self {
        Self {
            team_name: team_name.to_string(),
            recipient,
            recipient_color: recipient_color.to_string(),
            count: fresh.len(),
        }
    }

    pub fn os_notification(&self) -> OsNotification {
        let mut body = format!("{} needs you right now!", self.team_name);
        if self.count > 1 {
            body.push_str(&format!(" ({} pings)", self.count));
        }
        OsNotification {
            title: "🎯 IT'S YOUR TURN!".to_string(),
            body,
            tag: format!("turn-notification-{}", self.recipient),
            auto_close: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Activated,
    /// Folded into the flash already running.
    Dropped,
    /// The running flash was past the coalescing window; it was reset and a
    /// new one started.
    Restarted,
}

/// Owns the alert state, the flash observable and the notifier.
///
/// All transitions take the current instant explicitly; the caller decides
/// when timers and the watchdog run.
pub struct AlertTrigger<N> {
    policy: AlertPolicy,
    state: AlertState,
    flash: watch::Sender<Flash>,
    notifier: N,
}

impl<N: Notifier> AlertTrigger<N> {
    pub fn new(policy: AlertPolicy, notifier: N) -> Self {
        let (flash, _) = watch::channel(Flash::NEUTRAL);
        Self {
            policy,
            state: AlertState::Idle,
            flash,
            notifier,
        }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AlertState::Active { .. })
    }

    /// When the flash timer is due, if a flash is running.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            AlertState::Active { deadline, .. } => Some(deadline),
            AlertState::Idle => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Flash> {
        self.flash.subscribe()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn signal(&mut self, alert: &Alert, now: Instant) -> SignalOutcome {
        match self.state {
            AlertState::Idle => {
                self.activate(alert, now);
                SignalOutcome::Activated
            }
            AlertState::Active { since, .. } => {
                let elapsed = now.saturating_duration_since(since);
                if elapsed < self.policy.drop_window() {
                    tracing::debug!("Ping coalesced into running flash");
                    return SignalOutcome::Dropped;
                }
                if elapsed >= self.policy.stuck_after {
                    tracing::warn!("Flash active for {:?}, restarting it", elapsed);
                } else {
                    tracing::debug!("Flash outlived the coalescing window, restarting it");
                }
                self.reset();
                self.activate(alert, now);
                SignalOutcome::Restarted
            }
        }
    }

    /// Flash timer. Returns `true` when the flash ended.
    pub fn on_timer(&mut self, now: Instant) -> bool {
        match self.state {
            AlertState::Active { deadline, .. } if now >= deadline => {
                tracing::debug!("Flash complete");
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Watchdog tick. Ends a flash whose timer never fired (device sleep, a
    /// starved runtime). Returns `true` when it had to intervene.
    pub fn on_watchdog(&mut self, now: Instant) -> bool {
        match self.state {
            AlertState::Active { since, .. }
                if now.saturating_duration_since(since) >= self.policy.stuck_after =>
            {
                tracing::warn!("Flash stuck, forcing reset");
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// End of the view: whatever the state, the flash is cleared.
    pub fn teardown(&mut self) {
        self.reset();
    }

    fn activate(&mut self, alert: &Alert, now: Instant) {
        let color = Hsl::from_hex(&alert.recipient_color).unwrap_or(Hsl::NEUTRAL);
        self.state = AlertState::Active {
            since: now,
            deadline: now + self.policy.flash_duration,
        };
        self.flash.send_replace(Flash {
            active: true,
            color,
        });

        if let Err(e) = self.notifier.show(&alert.os_notification()) {
            tracing::warn!("Could not show notification: {}", e);
        }
    }

    fn reset(&mut self) {
        self.state = AlertState::Idle;
        self.flash.send_replace(Flash::NEUTRAL);
    }
}

impl<N> Drop for AlertTrigger<N> {
    fn drop(&mut self) {
        self.flash.send_replace(Flash::NEUTRAL);
    }
}

/// Resolves at `deadline`, never while no flash is running.
pub async fn until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
