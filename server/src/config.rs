//! Runtime settings of the match manager.
//!
//! Gameplay constants (tick rate, field size, win score) live in `shared` and
//! are not configurable; only the timeouts around a match and the buffering of
//! its event stream are.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a match may wait for its players before it is aborted.
    pub join_timeout: Duration,
    /// How long a match may stay paused before it is aborted.
    pub pause_timeout: Duration,
    /// Capacity of each match's event channel. Subscribers that fall further
    /// behind than this lose the oldest events.
    pub event_buffer: usize,
    /// Base seed for serve angles and AI noise; each match derives its own.
    pub base_seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(30),
            pause_timeout: Duration::from_secs(60),
            event_buffer: 256,
            base_seed: 0x5eed,
        }
    }
}

impl ServerConfig {
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_pause_timeout(mut self, timeout: Duration) -> Self {
        self.pause_timeout = timeout;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.join_timeout, Duration::from_secs(30));
        assert_eq!(config.pause_timeout, Duration::from_secs(60));
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::default()
            .with_join_timeout(Duration::from_secs(2))
            .with_pause_timeout(Duration::from_millis(500))
            .with_event_buffer(0)
            .with_base_seed(7);

        assert_eq!(config.join_timeout, Duration::from_secs(2));
        assert_eq!(config.pause_timeout, Duration::from_millis(500));
        // A broadcast channel cannot have zero capacity
        assert_eq!(config.event_buffer, 1);
        assert_eq!(config.base_seed, 7);
    }
}
