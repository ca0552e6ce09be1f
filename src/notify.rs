use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Destructive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    created: Instant,
}

/// Transient toasts. Each one disappears after the TTL or when dismissed.
#[derive(Debug, Clone)]
pub struct Notifications {
    items: Vec<Notification>,
    next_id: u64,
    ttl: Duration,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
            ttl,
        }
    }

    pub fn push(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> u64 {
        self.push_at(title, description, severity, Instant::now())
    }

    fn push_at(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        now: Instant,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Notification {
            id,
            title: title.into(),
            description: description.into(),
            severity,
            created: now,
        });
        id
    }

    /// Destructive toast carrying the error's own message.
    pub fn error(&mut self, title: impl Into<String>, error: &impl fmt::Display) -> u64 {
        let title = title.into();
        tracing::warn!(%title, %error, "surfacing error to user");
        self.push(title, error.to_string(), Severity::Destructive)
    }

    pub fn info(&mut self, title: impl Into<String>, description: impl Into<String>) -> u64 {
        self.push(title, description, Severity::Info)
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|item| item.id != id);
    }

    pub fn expire(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.items
            .retain(|item| now.saturating_duration_since(item.created) < ttl);
    }

    /// Time until the oldest toast expires, for scheduling a repaint.
    pub fn next_expiry(&self, now: Instant) -> Option<Duration> {
        self.items
            .iter()
            .map(|item| self.ttl.saturating_sub(now.saturating_duration_since(item.created)))
            .min()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;

    #[test]
    fn toasts_expire_after_ttl() {
        let start = Instant::now();
        let mut notifications = Notifications::new(Duration::from_secs(5));
        notifications.push_at("a", "", Severity::Info, start);
        notifications.push_at("b", "", Severity::Info, start + Duration::from_secs(3));

        notifications.expire(start + Duration::from_secs(4));
        assert_eq!(notifications.iter().count(), 2);
        assert_eq!(
            notifications.next_expiry(start + Duration::from_secs(4)),
            Some(Duration::from_secs(1))
        );

        notifications.expire(start + Duration::from_secs(5));
        let titles: Vec<&str> = notifications.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["b"]);
    }

    #[test]
    fn dismiss_removes_only_that_toast() {
        let mut notifications = Notifications::default();
        let first = notifications.info("first", "");
        notifications.info("second", "");
        notifications.dismiss(first);
        assert_eq!(notifications.iter().count(), 1);
        assert_eq!(notifications.iter().next().map(|n| n.id), Some(first + 1));
    }

    #[test]
    fn errors_are_destructive_with_raw_message() {
        let mut notifications = Notifications::default();
        notifications.error(
            "Error creating chat",
            &RemoteError::Rejected("row level security violation".to_string()),
        );
        let toast = notifications.iter().next().expect("one toast");
        assert_eq!(toast.severity, Severity::Destructive);
        assert_eq!(toast.description, "row level security violation");
    }
}
