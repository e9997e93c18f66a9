//! Engine configuration.

use std::time::Duration;

use mirror_core::touch::DEFAULT_IDENTIFIER;

/// Retries allowed per request before it is given up.
pub const MAX_RETRIES: u32 = 5;

/// Tunables of the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Retries allowed per request before it is given up.
    pub max_retries: u32,
    /// Pause between consecutive queue steps.
    pub queue_delay: Duration,
    /// Pause before a failed request is retried.
    pub retry_delay: Duration,
    /// Hold time that turns a press into a long press.
    pub long_press: Duration,
    /// Delay between a click preview and its send.
    pub click_delay: Duration,
    /// Viewport size in pixels, used for the minimum touch target.
    pub viewport: (f32, f32),
    /// Identifier used until the device announces one.
    pub identifier: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            queue_delay: Duration::from_millis(10),
            retry_delay: Duration::from_millis(10),
            long_press: Duration::from_millis(700),
            click_delay: Duration::from_millis(100),
            viewport: (800.0, 800.0),
            identifier: DEFAULT_IDENTIFIER.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry cap.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the pause between queue steps.
    #[must_use]
    pub fn with_queue_delay(mut self, delay: Duration) -> Self {
        self.queue_delay = delay;
        self
    }

    /// Set the retry pause.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the long-press threshold.
    #[must_use]
    pub fn with_long_press(mut self, duration: Duration) -> Self {
        self.long_press = duration;
        self
    }

    /// Set the click send delay.
    #[must_use]
    pub fn with_click_delay(mut self, delay: Duration) -> Self {
        self.click_delay = delay;
        self
    }

    /// Set the viewport size in pixels.
    #[must_use]
    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Set the fallback identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.queue_delay, Duration::from_millis(10));
        assert_eq!(config.long_press, Duration::from_millis(700));
        assert_eq!(config.click_delay, Duration::from_millis(100));
        assert_eq!(config.identifier, "pfodWeb");
    }

    #[test]
    fn test_builders() {
        let config = SyncConfig::new()
            .with_max_retries(2)
            .with_retry_delay(Duration::ZERO)
            .with_viewport(320.0, 240.0)
            .with_identifier("dev");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay, Duration::ZERO);
        assert_eq!(config.viewport, (320.0, 240.0));
        assert_eq!(config.identifier, "dev");
    }
}
