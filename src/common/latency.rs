//! Simulated replication latencies
//!
//! The delays make the replication window observable from outside the
//! cluster. Tests plug in [`NoLatency`]; deployments use [`FixedLatency`]
//! built from [`LatencyConfig`].

use crate::common::LatencyConfig;
use std::fmt::Debug;
use std::time::Duration;

/// Where a node pauses on the replication path
pub trait LatencyModel: Send + Sync + Debug {
    /// Coordinator side, before each replicate call to a peer
    fn network_delay(&self) -> Duration;

    /// Peer side, before a replicated write is applied
    fn apply_delay(&self) -> Duration;

    /// Peer side, before a local read is served
    fn read_delay(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedLatency {
    network: Duration,
    apply: Duration,
    read: Duration,
}

impl FixedLatency {
    pub fn new(network: Duration, apply: Duration, read: Duration) -> Self {
        Self {
            network,
            apply,
            read,
        }
    }
}

impl From<&LatencyConfig> for FixedLatency {
    fn from(config: &LatencyConfig) -> Self {
        Self::new(
            Duration::from_millis(config.network_delay_ms),
            Duration::from_millis(config.apply_delay_ms),
            Duration::from_millis(config.read_delay_ms),
        )
    }
}

impl LatencyModel for FixedLatency {
    fn network_delay(&self) -> Duration {
        self.network
    }

    fn apply_delay(&self) -> Duration {
        self.apply
    }

    fn read_delay(&self) -> Duration {
        self.read
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLatency;

impl LatencyModel for NoLatency {
    fn network_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn apply_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn read_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Sleep for `delay`, skipping the timer entirely when it is zero
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_fixed_from_config() {
        let latency = FixedLatency::from(&LatencyConfig::default());
        assert_eq!(latency.network_delay(), Duration::from_millis(200));
        assert_eq!(latency.apply_delay(), Duration::from_millis(100));
        assert_eq!(latency.read_delay(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pause_waits() {
        let start = Instant::now();
        pause(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
        pause(NoLatency.network_delay()).await;
    }
}
