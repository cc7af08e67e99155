use std::time::{Duration, Instant};

/// Longest time a notification stays on screen
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum NotificationLevel {
    Notice,
    Warning,
    Error,
}

/// Advisory, time-boxed message for the user-facing message surface
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub duration: Duration,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl Notification {
    /// Durations above [`MAX_DURATION`] are clamped
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration: Duration) -> Self {
        let duration = duration.min(MAX_DURATION);
        let now = Instant::now();
        Self {
            message: message.into(),
            level,
            duration,
            created_at: now,
            expires_at: now + duration,
        }
    }

    pub fn notice(message: impl Into<String>, duration: Duration) -> Self {
        Self::new(message, NotificationLevel::Notice, duration)
    }

    pub fn warning(message: impl Into<String>, duration: Duration) -> Self {
        Self::new(message, NotificationLevel::Warning, duration)
    }

    pub fn error(message: impl Into<String>, duration: Duration) -> Self {
        Self::new(message, NotificationLevel::Error, duration)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn time_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(5))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Show a notification; a zero duration falls back to the default.
    /// Expired notifications are dropped first.
    pub fn show(&mut self, mut notification: Notification) {
        self.update();
        if notification.duration.is_zero() {
            notification = Notification::new(
                notification.message,
                notification.level,
                self.default_duration,
            );
        }
        self.notifications.insert(0, notification);
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        self.show(Notification::new(message, level, self.default_duration));
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        self.notifications.len() != initial_len
    }

    /// Most recent notification
    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}
