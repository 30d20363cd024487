use chrono::{DateTime, Duration, Utc};

/// Decides whether the user counts as actively coding from the staleness of
/// the last recorded heartbeat.
pub struct ActivityWindow {
    max_staleness: Duration,
}

impl ActivityWindow {
    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            max_staleness: Duration::seconds(seconds as i64),
        }
    }

    /// No heartbeat means not active, regardless of the window.
    pub fn is_active(&self, now: DateTime<Utc>, last_heartbeat: Option<DateTime<Utc>>) -> bool {
        match last_heartbeat {
            Some(heartbeat) => now.signed_duration_since(heartbeat) <= self.max_staleness,
            None => false,
        }
    }
}
