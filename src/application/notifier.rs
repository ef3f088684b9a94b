// Non-blocking notifications surfaced alongside the canvas
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Keeps the most recent `limit` notifications and mirrors each one into the log
#[derive(Debug)]
pub struct Notifier {
    limit: usize,
    entries: VecDeque<Notification>,
}

impl Notifier {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NotificationLevel::Info => tracing::info!("{}", message),
            NotificationLevel::Warning => tracing::warn!("{}", message),
            NotificationLevel::Error => tracing::error!("{}", message),
        }

        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(Notification {
            level,
            message,
            at: Utc::now(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }

    pub fn recent(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_only_most_recent() {
        let mut notifier = Notifier::new(2);
        notifier.warn("one");
        notifier.error("two");
        notifier.notify(NotificationLevel::Info, "three");

        let messages: Vec<String> = notifier.recent().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
        assert_eq!(notifier.recent()[0].level, NotificationLevel::Error);
    }
}
