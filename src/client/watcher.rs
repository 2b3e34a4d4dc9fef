//! Decides which entries of a live feed are new pings for the local member.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::notification::FeedNotification;

/// Tracks which notification ids this view has already processed.
///
/// The seen-set only ever grows. Every id observed in a feed update is merged
/// into it in the same step that computes the fresh entries, so an id can be
/// reported as fresh at most once per watcher.
#[derive(Debug, Default)]
pub struct FeedWatcher {
    local_member: Option<Uuid>,
    seeded: bool,
    seen: HashSet<Uuid>,
}

impl FeedWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_member(&self) -> Option<Uuid> {
        self.local_member
    }

    /// Set (or clear) the identity pings are matched against.
    ///
    /// Becoming a different member re-arms seeding: the next feed is absorbed
    /// silently instead of replaying history addressed to the new identity.
    pub fn set_local_member(&mut self, member: Option<Uuid>) {
        if self.local_member != member {
            self.local_member = member;
            self.seeded = false;
        }
    }

    /// Process one feed delivery and return the entries addressed to the local
    /// member that were never seen before, in feed order (newest first).
    pub fn observe(&mut self, feed: &[FeedNotification]) -> Vec<FeedNotification> {
        let Some(local) = self.local_member else {
            self.seen.extend(feed.iter().map(|n| n.id));
            return Vec::new();
        };

        if !self.seeded {
            self.seen.extend(feed.iter().map(|n| n.id));
            self.seeded = true;
            tracing::debug!("Feed watcher seeded with {} notification(s)", feed.len());
            return Vec::new();
        }

        let fresh: Vec<FeedNotification> = feed
            .iter()
            .filter(|n| n.to_member_id == local && !self.seen.contains(&n.id))
            .cloned()
            .collect();
        self.seen.extend(feed.iter().map(|n| n.id));
        fresh
    }

    pub fn has_seen(&self, id: &Uuid) -> bool {
        self.seen.contains(id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
