//! Reclaimer Task
//!
//! Background task that periodically sweeps stale entries out of a store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// External signal that stops the reclaimer and closes its store when it
/// completes.
pub type CancelSignal = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

// == Reclaim Trait ==
/// What the reclaimer needs from the store it sweeps.
pub trait Reclaim: Send + Sync + 'static {
    /// Removes every stale entry and returns how many were removed.
    fn sweep(&self) -> usize;

    /// Whether the store has been closed.
    fn is_closed(&self) -> bool;

    /// Closes the store. Returns `true` only for the call that closed it.
    fn close(&self) -> bool;
}

/// Spawns the reclaimer for `target` on `runtime`.
///
/// The task sleeps for `interval` between sweeps. It exits when:
/// - `stop` observes `true` or its sender is dropped (`shutdown`),
/// - `cancel` completes, in which case the target is closed first,
/// - the target has been dropped.
///
/// Only a weak reference to the target is held, so the task never keeps a
/// dropped store alive. A sweep that is already running is never interrupted.
///
/// # Arguments
/// * `runtime` - Runtime hosting the task
/// * `target` - Store to sweep
/// * `interval` - Interval between sweeps, must be non-zero
/// * `stop` - Stop flag driven by the store
/// * `cancel` - Optional external cancellation signal
pub fn spawn_reclaimer<T: Reclaim>(
    runtime: &Handle,
    target: Weak<T>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
    cancel: Option<CancelSignal>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        info!(
            "Starting reclaimer with sweep interval of {} ms",
            interval.as_millis()
        );

        // First sweep happens one full interval after start
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cancelled = async move {
            match cancel {
                Some(signal) => signal.await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(cancelled);

        loop {
            tokio::select! {
                biased;

                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        debug!("Reclaimer received stop signal");
                        break;
                    }
                }
                _ = &mut cancelled => {
                    debug!("Reclaimer cancellation signal fired");
                    if let Some(target) = target.upgrade() {
                        target.close();
                    }
                    break;
                }
                _ = ticker.tick() => {
                    let Some(target) = target.upgrade() else {
                        break;
                    };
                    if target.is_closed() {
                        break;
                    }

                    let removed = target.sweep();
                    if removed > 0 {
                        info!("Reclaimer sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Reclaimer sweep: no expired entries found");
                    }
                }
            }
        }

        info!("Reclaimer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    /// Counts sweeps instead of touching a real table.
    struct Probe {
        sweeps: AtomicUsize,
        closed: AtomicBool,
        stop_tx: watch::Sender<bool>,
    }

    impl Probe {
        fn new() -> (Arc<Self>, watch::Receiver<bool>) {
            let (stop_tx, stop_rx) = watch::channel(false);
            let probe = Arc::new(Self {
                sweeps: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                stop_tx,
            });
            (probe, stop_rx)
        }
    }

    impl Reclaim for Probe {
        fn sweep(&self) -> usize {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            0
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn close(&self) -> bool {
            let first = !self.closed.swap(true, Ordering::SeqCst);
            if first {
                self.stop_tx.send_replace(true);
            }
            first
        }
    }

    const INTERVAL: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_reclaimer_sweeps_periodically() {
        let (probe, stop_rx) = Probe::new();
        let handle = spawn_reclaimer(
            &Handle::current(),
            Arc::downgrade(&probe),
            INTERVAL,
            stop_rx,
            None,
        );

        // No sweep before the first interval elapses
        assert_eq!(probe.sweeps.load(Ordering::SeqCst), 0);

        tokio::time::sleep(INTERVAL * 5).await;
        assert!(probe.sweeps.load(Ordering::SeqCst) >= 2);

        probe.close();
        tokio::time::sleep(INTERVAL).await;
        assert!(handle.is_finished(), "Reclaimer should stop after close");
    }

    #[tokio::test]
    async fn test_reclaimer_stops_sweeping_after_close() {
        let (probe, stop_rx) = Probe::new();
        let handle = spawn_reclaimer(
            &Handle::current(),
            Arc::downgrade(&probe),
            INTERVAL,
            stop_rx,
            None,
        );

        probe.close();
        tokio::time::sleep(INTERVAL * 4).await;

        assert_eq!(probe.sweeps.load(Ordering::SeqCst), 0);
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_cancellation_closes_target() {
        let (probe, stop_rx) = Probe::new();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let signal: CancelSignal = Box::pin(async move {
            let _ = cancel_rx.await;
        });
        let handle = spawn_reclaimer(
            &Handle::current(),
            Arc::downgrade(&probe),
            INTERVAL,
            stop_rx,
            Some(signal),
        );

        cancel_tx.send(()).unwrap();
        tokio::time::sleep(INTERVAL).await;

        assert!(probe.is_closed(), "Cancellation should close the target");
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_reclaimer_exits_when_target_dropped() {
        let (probe, stop_rx) = Probe::new();
        let weak = Arc::downgrade(&probe);
        let handle = spawn_reclaimer(&Handle::current(), weak, INTERVAL, stop_rx, None);

        // Dropping the only strong reference also drops the stop sender
        drop(probe);
        tokio::time::sleep(INTERVAL * 2).await;

        assert!(handle.is_finished(), "Task should be finished after drop");
    }
}
