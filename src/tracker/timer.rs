use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// A single cancellable polling task: `on_tick` runs every `interval` until
/// it returns `Stop`, the task is cancelled, or `ceiling` elapses (then
/// `on_ceiling` runs once). A tick due at the same instant as the ceiling
/// does not run, and a tick still in progress at the ceiling is dropped.
/// Ticks never overlap; a slow tick pushes later ones back.
#[derive(Default)]
pub struct PollTimer {
    handle: Option<JoinHandle<()>>,
}

impl PollTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts polling, cancelling any loop that is already running.
    pub fn start<T, Fut, C, CFut>(
        &mut self,
        interval: Duration,
        ceiling: Duration,
        mut on_tick: T,
        on_ceiling: C,
    ) where
        T: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickFlow> + Send + 'static,
        C: FnOnce() -> CFut + Send + 'static,
        CFut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let ticking = async {
                loop {
                    ticker.tick().await;
                    if on_tick().await == TickFlow::Stop {
                        break;
                    }
                }
            };

            tokio::select! {
                biased;
                _ = time::sleep(ceiling) => on_ceiling().await,
                _ = ticking => {}
            }
        });
        self.handle = Some(handle);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(ticks: &Arc<AtomicUsize>, stop_after: usize) -> impl FnMut() -> std::future::Ready<TickFlow> {
        let ticks = Arc::clone(ticks);
        move || {
            let n = ticks.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n >= stop_after {
                TickFlow::Stop
            } else {
                TickFlow::Continue
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_stops_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ceilings = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();

        let ceiling_count = Arc::clone(&ceilings);
        timer.start(
            Duration::from_secs(2),
            Duration::from_secs(60),
            counting(&ticks, usize::MAX),
            move || {
                ceiling_count.fetch_add(1, Ordering::SeqCst);
                std::future::ready(())
            },
        );

        time::sleep(Duration::from_secs(61)).await;
        // ticks at 2, 4, ..., 58; the one due at 60 loses to the ceiling
        assert_eq!(ticks.load(Ordering::SeqCst), 29);
        assert_eq!(ceilings.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 29);
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_fires_while_tick_is_blocked() {
        let ceilings = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();

        let ceiling_count = Arc::clone(&ceilings);
        timer.start(
            Duration::from_secs(2),
            Duration::from_secs(10),
            std::future::pending::<TickFlow>,
            move || async move {
                ceiling_count.fetch_add(1, Ordering::SeqCst);
            },
        );

        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(ceilings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_loop_without_ceiling() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ceilings = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();

        let ceiling_count = Arc::clone(&ceilings);
        timer.start(
            Duration::from_secs(2),
            Duration::from_secs(60),
            counting(&ticks, 3),
            move || {
                ceiling_count.fetch_add(1, Ordering::SeqCst);
                std::future::ready(())
            },
        );

        time::sleep(Duration::from_secs(90)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(ceilings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_previous_loop() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();

        timer.start(Duration::from_secs(2), Duration::from_secs(60), counting(&first, usize::MAX), || std::future::ready(()));
        time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(first.load(Ordering::SeqCst), 2);

        timer.start(Duration::from_secs(2), Duration::from_secs(60), counting(&second, usize::MAX), || std::future::ready(()));
        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_ceiling() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ceilings = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();

        let ceiling_count = Arc::clone(&ceilings);
        timer.start(
            Duration::from_secs(2),
            Duration::from_secs(6),
            counting(&ticks, usize::MAX),
            move || {
                ceiling_count.fetch_add(1, Ordering::SeqCst);
                std::future::ready(())
            },
        );
        time::sleep(Duration::from_millis(2500)).await;
        timer.cancel();
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert_eq!(ceilings.load(Ordering::SeqCst), 0);
    }
}
