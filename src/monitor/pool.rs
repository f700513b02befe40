//! Check worker pool.
//!
//! Many monitors are checked independently and potentially in parallel; one
//! worker per due monitor is the natural mapping. There is no shared mutable
//! state between monitors — each lives behind its own mutex in the pool
//! registry, and a worker holds that mutex for the duration of one
//! fetch+compare+transition cycle. A monitor already checked out is rejected,
//! never run concurrently.
//!
//! Submission uses a bounded channel: `try_submit` applies backpressure
//! instead of queueing without bound, and rejected jobs are counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::{StateError, WatchError, WatchResult};
use crate::event::SessionId;
use crate::fetch::Fetcher;
use crate::monitor::runner::{run_check, CheckContext, CheckOutcome, RunnerConfig};
use crate::monitor::{Monitor, MonitorId};
use crate::notify::EventSink;
use crate::storage::{ContentLookup, EventStore, MonitorStore, StorageError};

/// Pool sizing and cycle tunables.
#[derive(Debug, Clone)]
pub struct CheckPoolConfig {
    /// Number of check workers.
    pub workers: usize,
    /// Max queued check jobs before backpressure applies.
    pub queue_capacity: usize,
    /// Per-cycle tunables.
    pub runner: RunnerConfig,
}

impl Default for CheckPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            runner: RunnerConfig::default(),
        }
    }
}

struct Job {
    id: MonitorId,
    reply: Option<Sender<WatchResult<CheckOutcome>>>,
}

struct Shared {
    fetcher: Arc<dyn Fetcher>,
    lookup: Option<Arc<dyn ContentLookup>>,
    monitors: Arc<dyn MonitorStore>,
    events: Arc<dyn EventStore>,
    sink: Arc<dyn EventSink>,
    runner: RunnerConfig,
    registry: Mutex<HashMap<MonitorId, Arc<Mutex<Monitor>>>>,
}

/// Worker pool executing due monitors concurrently.
///
/// The scheduler that decides *when* a monitor becomes due lives outside the
/// core; it submits due monitor ids here. Monitors are persisted through the
/// [`MonitorStore`] after every cycle.
pub struct CheckPool {
    shared: Arc<Shared>,
    tx: Sender<Job>,
    dropped_jobs: AtomicU64,
    workers: Vec<JoinHandle<()>>,
}

impl CheckPool {
    /// Starts the pool with its collaborators.
    #[must_use]
    pub fn new(
        config: CheckPoolConfig,
        fetcher: Arc<dyn Fetcher>,
        lookup: Option<Arc<dyn ContentLookup>>,
        monitors: Arc<dyn MonitorStore>,
        events: Arc<dyn EventStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let shared = Arc::new(Shared {
            fetcher,
            lookup,
            monitors,
            events,
            sink,
            runner: config.runner,
            registry: Mutex::new(HashMap::new()),
        });

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("sourcewatch-check-{idx}"))
                .spawn(move || worker_loop(&shared, &rx))
                .expect("failed to spawn sourcewatch check worker");
            handles.push(handle);
        }

        Self {
            shared,
            tx,
            dropped_jobs: AtomicU64::new(0),
            workers: handles,
        }
    }

    /// Registers a new monitor with the pool and persists it.
    ///
    /// # Errors
    /// [`StorageError::DuplicateKey`] when the monitor already exists.
    pub fn track(&self, monitor: Monitor) -> WatchResult<()> {
        self.shared.monitors.insert(monitor.clone())?;
        let mut registry = self.lock_registry()?;
        registry.insert(monitor.id, Arc::new(Mutex::new(monitor)));
        Ok(())
    }

    /// Loads an already-persisted monitor into the pool registry.
    ///
    /// # Errors
    /// [`StorageError::MonitorNotFound`] when storage has no such monitor.
    pub fn adopt(&self, id: MonitorId) -> WatchResult<()> {
        let monitor = self
            .shared
            .monitors
            .get(id)?
            .ok_or(StorageError::MonitorNotFound(id))?;
        let mut registry = self.lock_registry()?;
        registry.insert(id, Arc::new(Mutex::new(monitor)));
        Ok(())
    }

    /// Enqueues a check without blocking.
    ///
    /// # Errors
    /// [`WatchError::QueueFull`] under backpressure (the job is counted as
    /// dropped), [`WatchError::Disconnected`] after shutdown.
    pub fn try_submit(&self, id: MonitorId) -> WatchResult<()> {
        match self.tx.try_send(Job { id, reply: None }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_jobs.fetch_add(1, Ordering::Relaxed);
                Err(WatchError::QueueFull {
                    path: "check".to_string(),
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(WatchError::Disconnected {
                path: "check".to_string(),
            }),
        }
    }

    /// Runs a check and waits for its outcome.
    ///
    /// # Errors
    /// Everything [`run_check`] can return, plus
    /// [`WatchError::Disconnected`] after shutdown and
    /// [`StateError::AlreadyExecuting`] when the monitor is checked out.
    pub fn run_now(&self, id: MonitorId) -> WatchResult<CheckOutcome> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(Job {
                id,
                reply: Some(reply_tx),
            })
            .map_err(|_| WatchError::Disconnected {
                path: "check".to_string(),
            })?;
        reply_rx.recv().map_err(|_| WatchError::Disconnected {
            path: "check_reply".to_string(),
        })?
    }

    /// Number of jobs rejected by backpressure.
    #[must_use]
    pub fn dropped_jobs(&self) -> u64 {
        self.dropped_jobs.load(Ordering::Relaxed)
    }

    /// Snapshot copy of a tracked monitor.
    ///
    /// Blocks until any in-flight cycle for the monitor finishes.
    #[must_use]
    pub fn monitor(&self, id: MonitorId) -> Option<Monitor> {
        let slot = {
            let registry = self.shared.registry.lock().ok()?;
            registry.get(&id).cloned()?
        };
        let guard = slot.lock().ok()?;
        Some(guard.clone())
    }

    /// Runs `op` under the monitor's exclusion lock and persists the result.
    ///
    /// This is how out-of-band operations (event resolution, restart,
    /// enable/disable) serialize with check cycles.
    ///
    /// # Errors
    /// [`StorageError::MonitorNotFound`] for untracked monitors and
    /// storage errors from the persist step.
    pub fn with_monitor<T>(
        &self,
        id: MonitorId,
        op: impl FnOnce(&mut Monitor) -> T,
    ) -> WatchResult<T> {
        let slot = {
            let registry = self.lock_registry()?;
            registry
                .get(&id)
                .cloned()
                .ok_or(StorageError::MonitorNotFound(id))?
        };
        let mut monitor = slot
            .lock()
            .map_err(|_| WatchError::internal("poisoned monitor lock"))?;
        let out = op(&mut monitor);
        self.shared.monitors.update(monitor.clone())?;
        Ok(out)
    }

    fn lock_registry(&self) -> WatchResult<std::sync::MutexGuard<'_, HashMap<MonitorId, Arc<Mutex<Monitor>>>>> {
        self.shared
            .registry
            .lock()
            .map_err(|_| WatchError::internal("poisoned registry lock"))
    }
}

impl Drop for CheckPool {
    fn drop(&mut self) {
        // Close the queue so workers drain and exit, then join them.
        let (dummy_tx, _) = bounded::<Job>(1);
        let old_tx = std::mem::replace(&mut self.tx, dummy_tx);
        drop(old_tx);

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &Arc<Shared>, rx: &Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        let result = run_one(shared, job.id);
        if let Some(reply) = job.reply {
            let _ = reply.send(result);
        }
    }
}

fn run_one(shared: &Arc<Shared>, id: MonitorId) -> WatchResult<CheckOutcome> {
    let slot = {
        let registry = shared
            .registry
            .lock()
            .map_err(|_| WatchError::internal("poisoned registry lock"))?;
        registry
            .get(&id)
            .cloned()
            .ok_or(StorageError::MonitorNotFound(id))?
    };

    // The per-monitor mutex is the execution guard: held for the whole
    // cycle, and a busy monitor is rejected instead of waited on.
    let mut monitor = match slot.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::WouldBlock) => {
            return Err(StateError::AlreadyExecuting { id }.into());
        }
        Err(TryLockError::Poisoned(_)) => {
            return Err(WatchError::internal("poisoned monitor lock"));
        }
    };

    let ctx = CheckContext {
        fetcher: shared.fetcher.as_ref(),
        lookup: shared.lookup.as_deref(),
        events: shared.events.as_ref(),
        sink: shared.sink.as_ref(),
        config: &shared.runner,
        session: SessionId::new(),
    };

    let outcome = run_check(&mut monitor, &ctx);

    // Persist every transition, including failed cycles.
    shared.monitors.update(monitor.clone())?;
    outcome
}
