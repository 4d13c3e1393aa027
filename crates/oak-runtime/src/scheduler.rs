use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Owns the daemon's background tasks and the single shutdown signal they
/// all observe. Periodic tasks are ticked at a fixed cadence; `shutdown`
/// flips the signal and joins everything.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a long-lived worker that manages its own lifecycle against
    /// the shutdown receiver it was given.
    pub fn spawn<F>(&mut self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(worker = name, "background worker started");
        self.handles.push((name.to_string(), tokio::spawn(future)));
    }

    /// Spawn a task that runs `tick` every `interval` until shutdown
    pub fn spawn_periodic<T, Fut>(&mut self, name: &str, interval: Duration, mut tick: T)
    where
        T: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_signal();
        let task_name = name.to_string();
        self.spawn(name, async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        tick().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::debug!(worker = %task_name, "periodic worker stopping");
                            return;
                        }
                    }
                }
            }
        });
    }

    /// Flip the shutdown signal and wait for every worker to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (name, handle) in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(worker = %name, error = %err, "worker did not stop cleanly");
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_periodic_task_ticks_and_stops() {
        let mut scheduler = Scheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        scheduler.spawn_periodic("counter", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.shutdown().await;

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several ticks, saw {}", seen);
    }

    #[tokio::test]
    async fn test_shutdown_reaches_spawned_workers() {
        let mut scheduler = Scheduler::new();
        let mut shutdown = scheduler.shutdown_signal();
        let stopped = Arc::new(AtomicUsize::new(0));

        let flag = stopped.clone();
        scheduler.spawn("waiter", async move {
            loop {
                if shutdown.changed().await.is_err() || *shutdown.borrow() {
                    flag.fetch_add(1, Ordering::SeqCst);
                    return;
                }
            }
        });

        scheduler.shutdown().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }
}
