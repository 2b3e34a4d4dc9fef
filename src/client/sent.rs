use std::collections::HashMap;

use tokio::time::{Duration, Instant};
use uuid::Uuid;

pub const SENT_DISPLAY: Duration = Duration::from_secs(3);

/// "Sent" badges shown on recipients right after a successful ping. They are
/// purely local and expire on their own, whether or not the ping was seen.
#[derive(Debug, Default)]
pub struct SentIndicators {
    until: HashMap<Uuid, Instant>,
}

impl SentIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, member_id: Uuid, now: Instant) {
        self.until.insert(member_id, now + SENT_DISPLAY);
    }

    pub fn is_showing(&self, member_id: &Uuid, now: Instant) -> bool {
        self.until.get(member_id).is_some_and(|until| now < *until)
    }

    /// Forget expired badges.
    pub fn prune(&mut self, now: Instant) {
        self.until.retain(|_, until| now < *until);
    }

    pub fn len(&self) -> usize {
        self.until.len()
    }

    pub fn is_empty(&self) -> bool {
        self.until.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_expires_after_display_time() {
        let id = Uuid::new_v4();
        let t0 = Instant::now();
        let mut sent = SentIndicators::new();
        sent.mark(id, t0);

        assert!(sent.is_showing(&id, t0 + Duration::from_secs(2)));
        assert!(!sent.is_showing(&id, t0 + SENT_DISPLAY));

        sent.prune(t0 + SENT_DISPLAY);
        assert!(sent.is_empty());
    }

    #[test]
    fn marking_again_extends_the_badge() {
        let id = Uuid::new_v4();
        let t0 = Instant::now();
        let mut sent = SentIndicators::new();
        sent.mark(id, t0);
        sent.mark(id, t0 + Duration::from_secs(2));
        assert!(sent.is_showing(&id, t0 + Duration::from_secs(4)));
        assert_eq!(sent.len(), 1);
    }
}
