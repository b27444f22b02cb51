use bourse_core::VenueId;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Kinds of recurring per-venue work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Change watcher poll
    WatchPoll,
    /// Order count decay
    Rebalance,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::WatchPoll => f.write_str("watch-poll"),
            TaskKind::Rebalance => f.write_str("rebalance"),
        }
    }
}

type TaskKey = (TaskKind, VenueId);

/// A running recurring task
struct RecurringTask {
    stop_tx: watch::Sender<bool>,
    // Dropping the handle detaches the task; it exits on the stop signal
    _handle: JoinHandle<()>,
    period: Duration,
}

impl RecurringTask {
    fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Registry of named, cancellable recurring tasks keyed by `(kind, venue)`
///
/// At most one task runs per key. Each task is a single tokio task, so two
/// firings of the same key never overlap. A stop takes effect before the
/// next firing; a firing already running completes.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskKey, RecurringTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `tick` every `period`, first after one full period
    ///
    /// Replaces any task already registered under the same key; the old
    /// task is signalled to stop before the new one is spawned. Must be
    /// called from within a tokio runtime.
    pub fn start<F, Fut>(&self, kind: TaskKind, venue_id: VenueId, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        if let Some(old) = tasks.remove(&(kind, venue_id)) {
            debug!("Replacing {} task for venue {}", kind, venue_id);
            old.stop();
        }

        // Anchored at the call, not at the task's first poll
        let first = Instant::now() + period;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    // Fires on an explicit stop and when the registry drops the sender
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                tick().await;
            }
            debug!("{} task for venue {} stopped", kind, venue_id);
        });

        tasks.insert(
            (kind, venue_id),
            RecurringTask {
                stop_tx,
                _handle: handle,
                period,
            },
        );
        info!("Started {} task for venue {} every {:?}", kind, venue_id, period);
    }

    /// Stop a task; returns false when none was registered
    pub fn cancel(&self, kind: TaskKind, venue_id: VenueId) -> bool {
        match self.tasks.lock().remove(&(kind, venue_id)) {
            Some(task) => {
                task.stop();
                info!("Stopped {} task for venue {}", kind, venue_id);
                true
            }
            None => false,
        }
    }

    /// Stop every task, returning how many were running
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.tasks.lock().drain().collect();
        let count = drained.len();
        for (_, task) in drained {
            task.stop();
        }
        if count > 0 {
            info!("Stopped {} recurring task(s)", count);
        }
        count
    }

    pub fn is_active(&self, kind: TaskKind, venue_id: VenueId) -> bool {
        self.tasks.lock().contains_key(&(kind, venue_id))
    }

    /// Period of a registered task
    pub fn period(&self, kind: TaskKind, venue_id: VenueId) -> Option<Duration> {
        self.tasks.lock().get(&(kind, venue_id)).map(|t| t.period)
    }

    /// Venues with a task of this kind
    pub fn active(&self, kind: TaskKind) -> Vec<VenueId> {
        self.tasks
            .lock()
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, venue)| *venue)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}
