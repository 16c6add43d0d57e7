//! Timer scheduling
//!
//! The controller never sleeps itself. It asks a [`Scheduler`] for periodic
//! ticks tagged with the session generation, and the host feeds those ticks
//! back through [`RecordingController::on_tick`](super::RecordingController::on_tick).
//! Dropping or cancelling the returned [`TimerGuard`] stops the ticks.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A tick delivered by a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub generation: u64,
}

/// Cancels a scheduled timer when cancelled or dropped
pub struct TimerGuard {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl TimerGuard {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerGuard")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Source of periodic ticks
pub trait Scheduler: Send + Sync {
    /// Deliver a tick tagged with `generation` every `period` until the
    /// guard is cancelled. The first tick arrives one period after the call.
    fn schedule_ticks(&self, generation: u64, period: Duration) -> TimerGuard;
}

/// Tokio interval timers forwarding ticks over a channel
#[derive(Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerTick>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its ticks arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_ticks(&self, generation: u64, period: Duration) -> TimerGuard {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if tx.send(TimerTick { generation }).is_err() {
                    break;
                }
            }
        });
        tracing::debug!("Timer {} scheduled every {:?}", generation, period);

        let abort = handle.abort_handle();
        TimerGuard::new(move || {
            abort.abort();
            tracing::debug!("Timer {} cancelled", generation);
        })
    }
}

/// One timer requested from a [`ManualScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub generation: u64,
    pub period: Duration,
    pub cancelled: bool,
}

/// Scheduler that records requests and never fires on its own; the host
/// (or a test) calls `on_tick` explicitly.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timers: Arc<Mutex<Vec<ScheduledTimer>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the timer still running, if any
    pub fn active_generation(&self) -> Option<u64> {
        self.timers
            .lock()
            .iter()
            .rev()
            .find(|t| !t.cancelled)
            .map(|t| t.generation)
    }

    pub fn active_count(&self) -> usize {
        self.timers.lock().iter().filter(|t| !t.cancelled).count()
    }

    pub fn timers(&self) -> Vec<ScheduledTimer> {
        self.timers.lock().clone()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_ticks(&self, generation: u64, period: Duration) -> TimerGuard {
        let index = {
            let mut timers = self.timers.lock();
            timers.push(ScheduledTimer {
                generation,
                period,
                cancelled: false,
            });
            timers.len() - 1
        };
        let timers = self.timers.clone();
        TimerGuard::new(move || {
            if let Some(timer) = timers.lock().get_mut(index) {
                timer.cancelled = true;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_guard_cancels_on_drop() {
        let scheduler = ManualScheduler::new();
        let guard = scheduler.schedule_ticks(1, Duration::from_secs(1));
        assert_eq!(scheduler.active_generation(), Some(1));
        drop(guard);
        assert_eq!(scheduler.active_generation(), None);
    }

    #[test]
    fn test_manual_guard_cancel_is_idempotent() {
        let scheduler = ManualScheduler::new();
        scheduler.schedule_ticks(1, Duration::from_secs(1)).cancel();
        let _second = scheduler.schedule_ticks(2, Duration::from_secs(1));
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(scheduler.active_generation(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_ticks_once_per_period() {
        let (scheduler, mut rx) = TokioScheduler::new();
        let guard = scheduler.schedule_ticks(7, Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let mut received = Vec::new();
        while let Ok(tick) = rx.try_recv() {
            received.push(tick);
        }
        assert_eq!(received, vec![TimerTick { generation: 7 }; 3]);

        guard.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
