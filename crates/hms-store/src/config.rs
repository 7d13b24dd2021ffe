//! # Store Configuration

use std::time::Duration;

/// Default bound on how long a transaction waits for a row lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning shared by every store engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Longest wait for a row lock before the operation fails as busy.
    pub lock_timeout: Duration,
    /// Upper bound on pooled database connections.
    pub max_connections: u32,
    /// Longest wait for a pooled connection.
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    /// Override the lock wait bound.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Lock timeout in whole milliseconds, never below 1.
    pub fn lock_timeout_ms(&self) -> u128 {
        self.lock_timeout.as_millis().max(1)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_millisecond_timeouts_round_up() {
        let config = StoreConfig::default().with_lock_timeout(Duration::from_micros(10));
        assert_eq!(config.lock_timeout_ms(), 1);
    }

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
        assert_eq!(config.max_connections, 10);
    }
}
