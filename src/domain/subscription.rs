//! src/domain/subscription.rs

use crate::domain::{City, SubscriberEmail};
use chrono::{DateTime, TimeDelta, Utc};

/// Row id assigned by the store; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub i64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub email: SubscriberEmail,
    pub city: City,
    pub last_alert: Option<DateTime<Utc>>,
}

impl Subscription {
    /// True while the last successful alert is younger than `cooldown`.
    pub fn is_cooling_down(&self, now: DateTime<Utc>, cooldown: TimeDelta) -> bool {
        match self.last_alert {
            Some(last_alert) => now - last_alert < cooldown,
            None => false,
        }
    }
}
