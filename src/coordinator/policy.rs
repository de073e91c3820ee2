//! Timing policies owned by the coordinator.
//!
//! These react to broker-level signals (health checks, heartbeat silence).
//! Socket-level retry lives in the transports and is configured separately
//! through [`SocketRetryPolicy`](rabbitwatch_adapters::SocketRetryPolicy).

use std::time::Duration;

use tokio::time::Instant;

use crate::config::Settings;

/// Exponential backoff for the outer reconnection loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Scheduled attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (1-based).
    ///
    /// `base * multiplier^(attempt - 1)`, capped at `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Whether `attempts` already spent the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// Liveness probing while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    pub interval: Duration,
    /// Silence beyond this forces a reconnection.
    pub timeout: Duration,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HeartbeatPolicy {
    pub fn is_stale(&self, last_ok: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_ok) > self.timeout
    }
}

impl From<&Settings> for ReconnectPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            base_delay: settings.reconnect.base_delay,
            multiplier: settings.reconnect.multiplier,
            max_delay: settings.reconnect.max_delay,
            max_attempts: settings.reconnect.max_attempts,
        }
    }
}

impl From<&Settings> for HeartbeatPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.heartbeat.interval,
            timeout: settings.heartbeat.timeout,
        }
    }
}
