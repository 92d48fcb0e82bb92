use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Fixed-cadence tick source that stops on cancellation.
///
/// Overrunning ticks are not caught up: after a slow tick the next one
/// fires immediately and the cadence restarts from there.
pub struct PollSchedule {
    ticker: Interval,
    shutdown: CancellationToken,
}

impl PollSchedule {
    pub fn new(every: Duration, shutdown: CancellationToken) -> Self {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { ticker, shutdown }
    }

    /// Waits for the next tick. Returns `false` once shutdown was requested,
    /// including when it was requested while the previous tick was running.
    pub async fn next_tick(&mut self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = self.ticker.tick() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_periodic() {
        let mut s = PollSchedule::new(Duration::from_secs(5), CancellationToken::new());
        let start = tokio::time::Instant::now();

        assert!(s.next_tick().await);
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert!(s.next_tick().await);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_the_schedule() {
        let token = CancellationToken::new();
        let mut s = PollSchedule::new(Duration::from_secs(5), token.clone());

        assert!(s.next_tick().await);
        token.cancel();
        assert!(!s.next_tick().await);
        assert!(!s.next_tick().await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_pending_wait() {
        let token = CancellationToken::new();
        let mut s = PollSchedule::new(Duration::from_secs(3600), token.clone());
        assert!(s.next_tick().await);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        assert!(!s.next_tick().await);
        assert!(start.elapsed() < Duration::from_secs(3600));
    }
}
