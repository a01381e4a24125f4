//! Heartbeat pacemaker
//!
//! Emits heartbeats on the interval dictated by Hello and watches for the
//! server's acks. Death is reported on a dedicated channel that the event
//! loop selects on.

use super::error::GatewayError;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Unix-nano timestamps of the last heartbeat sent and the last ack seen
///
/// `sent` is written only by the pacemaker task, `echo` only by the receive
/// path; both are read atomically.
#[derive(Debug, Default)]
pub struct Beats {
    sent: AtomicI64,
    echo: AtomicI64,
}

impl Beats {
    /// Record a heartbeat ack from the receive side
    pub fn echo(&self) {
        self.echo.store(now_nanos(), Ordering::SeqCst);
    }

    fn pace(&self) {
        self.sent.store(now_nanos(), Ordering::SeqCst);
    }

    fn reset(&self) {
        self.sent.store(0, Ordering::SeqCst);
        self.echo.store(0, Ordering::SeqCst);
    }

    fn dead(&self, heartrate: Duration) -> bool {
        let echo = self.echo.load(Ordering::SeqCst);
        let sent = self.sent.load(Ordering::SeqCst);

        if echo == 0 || sent == 0 {
            return false;
        }

        sent - echo > heartrate.as_nanos() as i64 * 2
    }
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// Periodic heartbeat scheduler with a liveness check
pub struct Pacemaker {
    heartrate: Duration,
    beats: Arc<Beats>,
}

impl Pacemaker {
    /// Create a pacemaker over shared beat timestamps
    #[must_use]
    pub fn new(heartrate: Duration, beats: Arc<Beats>) -> Self {
        Self { heartrate, beats }
    }

    /// Whether two full intervals have passed without an ack
    #[must_use]
    pub fn dead(&self) -> bool {
        self.beats.dead(self.heartrate)
    }

    /// Start the pacemaker task
    ///
    /// `pace` sends one heartbeat; a pace failure or a failed liveness check
    /// ends the task with `Some(error)` on the returned death channel, a stop
    /// signal ends it with `None`. The first interval is never falsely dead:
    /// an initial echo is stamped before the task starts ticking.
    pub fn start<F, Fut>(
        self,
        pace: F,
        stop: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, mpsc::Receiver<Option<GatewayError>>)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        self.beats.reset();
        self.beats.echo();

        let (death_tx, death_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            let result = self.run(pace, stop).await;
            if let Err(err) = &result {
                tracing::debug!(error = %err, "pacemaker died");
            }
            let _ = death_tx.send(result.err()).await;
        });

        (handle, death_rx)
    }

    async fn run<F, Fut>(
        &self,
        pace: F,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), GatewayError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<(), GatewayError>> + Send,
    {
        // First beat one full interval after start, not immediately.
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.heartrate,
            self.heartrate,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.changed() => return Ok(()),
                _ = ticker.tick() => {
                    pace().await?;
                    self.beats.pace();

                    if self.dead() {
                        return Err(GatewayError::Dead);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sampler() -> (
        Arc<AtomicUsize>,
        impl Fn() -> futures_util::future::Ready<Result<(), GatewayError>>,
    ) {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let pace = move || {
            counted.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(()))
        };
        (count, pace)
    }

    #[tokio::test]
    async fn test_healthy_pacemaker_stays_alive() {
        let beats = Arc::new(Beats::default());
        let pacemaker = Pacemaker::new(Duration::from_millis(10), beats.clone());

        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let echoed = beats.clone();
        let pace = move || {
            counted.fetch_add(1, Ordering::SeqCst);
            // The ack arrives promptly every interval.
            echoed.echo();
            futures_util::future::ready(Ok(()))
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let (handle, mut death_rx) = pacemaker.start(pace, stop_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(count.load(Ordering::SeqCst) >= 2, "expected several beats");
        assert!(death_rx.try_recv().is_err(), "pacemaker should still be alive");

        drop(stop_tx);
        assert!(matches!(death_rx.recv().await, Some(None)));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unacked_heartbeats_kill_the_pacemaker() {
        let beats = Arc::new(Beats::default());
        let pacemaker = Pacemaker::new(Duration::from_millis(10), beats);

        let (count, pace) = sampler();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (handle, mut death_rx) = pacemaker.start(pace, stop_rx);

        // No echo ever arrives after the initial stamp, so the third beat
        // crosses the two-interval threshold.
        let death = tokio::time::timeout(Duration::from_secs(1), death_rx.recv())
            .await
            .expect("pacemaker never died");
        assert!(matches!(death, Some(Some(GatewayError::Dead))));
        assert!(count.load(Ordering::SeqCst) >= 3);

        // Death is reported exactly once; afterwards the channel just closes.
        assert!(death_rx.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_pace_error_stops_the_pacemaker() {
        let beats = Arc::new(Beats::default());
        let pacemaker = Pacemaker::new(Duration::from_millis(5), beats);

        let pace = || futures_util::future::ready(Err(GatewayError::EmptyFrame));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (handle, mut death_rx) = pacemaker.start(pace, stop_rx);

        let death = tokio::time::timeout(Duration::from_secs(1), death_rx.recv())
            .await
            .expect("pacemaker never reported");
        assert!(matches!(death, Some(Some(GatewayError::EmptyFrame))));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_clean() {
        let beats = Arc::new(Beats::default());
        let pacemaker = Pacemaker::new(Duration::from_secs(60), beats);

        let (_count, pace) = sampler();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (handle, mut death_rx) = pacemaker.start(pace, stop_rx);

        drop(stop_tx);
        let death = death_rx.recv().await;
        assert!(matches!(death, Some(None)));
        handle.await.unwrap();
    }

    #[test]
    fn test_dead_requires_both_stamps() {
        let beats = Beats::default();
        assert!(!beats.dead(Duration::from_millis(10)));

        beats.echo();
        assert!(!beats.dead(Duration::from_millis(10)));

        // Sent far enough after the echo to cross two intervals.
        beats.sent.store(
            beats.echo.load(Ordering::SeqCst) + Duration::from_millis(25).as_nanos() as i64,
            Ordering::SeqCst,
        );
        assert!(beats.dead(Duration::from_millis(10)));
        assert!(!beats.dead(Duration::from_millis(20)));
    }
}
