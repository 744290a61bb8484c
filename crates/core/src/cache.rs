//! Per-kind resource cache with auto-refresh scheduling
//!
//! A [`ResourceCache`] keeps the latest full list of one resource kind,
//! obtained by building the list argv, running it through an [`Executor`]
//! and normalizing the response. Observers read the current [`Snapshot`] or
//! subscribe to replacements.
//!
//! ## Refresh rules
//!
//! * At most one refresh per cache is in flight. A timer tick that finds one
//!   running is skipped, not queued. An explicit [`ResourceCache::refresh`]
//!   that finds one running waits for it and reports its outcome.
//! * A successful refresh replaces the snapshot wholesale and notifies every
//!   subscriber, even when the content did not change.
//! * A failed refresh keeps the previous snapshot and notifies nobody. Only
//!   explicit refresh callers see the error.
//! * Lookups read the current snapshot. The first lookup before the cache
//!   was ever populated performs one refresh so callers do not see an empty
//!   list just because no tick has happened yet.
//!
//! ## Lifecycle
//!
//! [`ResourceCache::start`] spawns the poll timer (none when the configured
//! interval is 0) and a settings watcher. A changed poll interval tears the
//! timer down and starts a new one. [`ResourceCache::dispose`] aborts every
//! task and closes subscriptions; it runs once and is safe on a cache that
//! was never started. Dropping the cache disposes it.

use crate::args;
use crate::config::ConfigHolder;
use crate::errors::CacheError;
use crate::gateway::{Executor, Output};
use crate::model::ResourceKind;
use crate::normalize::{normalize_list, Normalize};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// One complete list of a resource kind
#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    pub items: Vec<R>,
    /// Number of successful refreshes so far; 0 means never populated
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl<R> Snapshot<R> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            generation: 0,
            refreshed_at: None,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.generation > 0
    }
}

/// Change feed for a [`ResourceCache`]
#[derive(Debug)]
pub struct SnapshotSubscription<R> {
    receiver: watch::Receiver<Arc<Snapshot<R>>>,
}

impl<R> SnapshotSubscription<R> {
    /// Wait for the next replaced snapshot. Returns `None` once the cache is disposed.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot<R>>> {
        self.receiver.changed().await.ok()?;
        Some(Arc::clone(&self.receiver.borrow_and_update()))
    }
}

#[derive(Debug, Default)]
struct Tasks {
    timer: Option<JoinHandle<()>>,
    config_watch: Option<JoinHandle<()>>,
    in_flight: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for handle in [
            self.timer.take(),
            self.config_watch.take(),
            self.in_flight.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct Inner<R> {
    executor: Arc<dyn Executor>,
    config: ConfigHolder,
    /// Taken on dispose, which closes every subscription
    sender: Mutex<Option<watch::Sender<Arc<Snapshot<R>>>>>,
    receiver: watch::Receiver<Arc<Snapshot<R>>>,
    refreshing: AtomicBool,
    refresh_done: Notify,
    last_outcome: Mutex<Option<Result<(), CacheError>>>,
    /// Set once the first lookup's populate attempt has finished
    initial_lookup: OnceCell<()>,
    disposed: AtomicBool,
    tasks: Mutex<Tasks>,
}

/// Exclusive right to run one refresh. Dropping it clears the in-flight flag
/// and wakes coalesced waiters.
struct RefreshGuard<R: Normalize> {
    inner: Arc<Inner<R>>,
    outcome: Option<Result<(), CacheError>>,
}

impl<R: Normalize> RefreshGuard<R> {
    async fn run(mut self) -> Result<(), CacheError> {
        let outcome = self.inner.fetch_and_publish().await;
        self.outcome = Some(outcome.clone());
        outcome
    }
}

impl<R: Normalize> Drop for RefreshGuard<R> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            Err(CacheError::RefreshFailed {
                kind: R::KIND,
                message: "refresh was cancelled".to_string(),
            })
        });
        *lock(&self.inner.last_outcome) = Some(outcome);
        self.inner.refreshing.store(false, Ordering::Release);
        self.inner.refresh_done.notify_waiters();
    }
}

impl<R: Normalize> Inner<R> {
    fn try_begin(self: &Arc<Self>) -> Option<RefreshGuard<R>> {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                inner: Arc::clone(self),
                outcome: None,
            })
    }

    async fn fetch_and_publish(&self) -> Result<(), CacheError> {
        let config = self.config.current();
        let argv = args::list(R::KIND, config.show_stopped);
        let result = self.executor.execute(&argv, true).await;

        if self.disposed.load(Ordering::Acquire) {
            return Err(CacheError::Disposed { kind: R::KIND });
        }

        match result.into_result() {
            Ok(output) => {
                let items = normalize_list::<R>(&Output::into_json(output));
                self.publish(items);
                Ok(())
            }
            Err(error) => {
                warn!(kind = %R::KIND, %error, "Refresh failed, keeping previous snapshot");
                Err(CacheError::RefreshFailed {
                    kind: R::KIND,
                    message: error.to_string(),
                })
            }
        }
    }

    fn publish(&self, items: Vec<R>) {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return;
        };
        let generation = sender.borrow().generation + 1;
        debug!(kind = %R::KIND, count = items.len(), generation, "Snapshot replaced");
        sender.send_replace(Arc::new(Snapshot {
            items,
            generation,
            refreshed_at: Some(Utc::now()),
        }));
    }

    /// Explicit refresh: run one, or wait for the one in flight
    async fn refresh(self: &Arc<Self>) -> Result<(), CacheError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CacheError::Disposed { kind: R::KIND });
        }

        let notified = self.refresh_done.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match self.try_begin() {
            Some(guard) => guard.run().await,
            None => {
                debug!(kind = %R::KIND, "Refresh in flight, waiting for its outcome");
                notified.await;
                lock(&self.last_outcome)
                    .clone()
                    .unwrap_or(Err(CacheError::Disposed { kind: R::KIND }))
            }
        }
    }

    /// Timer tick: start a refresh in the background unless one is running
    fn tick(self: &Arc<Self>) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        match self.try_begin() {
            Some(guard) => {
                let handle = tokio::spawn(async move {
                    let _ = guard.run().await;
                });
                lock(&self.tasks).in_flight = Some(handle);
            }
            None => debug!(kind = %R::KIND, "Refresh already in flight, skipping tick"),
        }
    }

    fn spawn_timer(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(inner) = Weak::upgrade(&weak) else {
                    break;
                };
                inner.tick();
            }
        })
    }

    fn restart_timer(self: &Arc<Self>, tasks: &mut Tasks, period: Option<Duration>) {
        if let Some(timer) = tasks.timer.take() {
            timer.abort();
        }
        match period {
            Some(period) => {
                info!(kind = %R::KIND, period_ms = period.as_millis() as u64, "Starting poll timer");
                tasks.timer = Some(self.spawn_timer(period));
            }
            None => info!(kind = %R::KIND, "Polling disabled, refreshing on demand only"),
        }
    }

    fn spawn_config_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut subscription = self.config.subscribe();
        let initial = self.config.current();
        tokio::spawn(async move {
            let mut period = initial.poll_interval();
            let mut show_stopped = initial.show_stopped;
            while let Some(config) = subscription.changed().await {
                let Some(inner) = Weak::upgrade(&weak) else {
                    break;
                };
                if inner.disposed.load(Ordering::Acquire) {
                    break;
                }
                if config.poll_interval() != period {
                    period = config.poll_interval();
                    let mut tasks = lock(&inner.tasks);
                    inner.restart_timer(&mut tasks, period);
                }
                if R::KIND == ResourceKind::Container && config.show_stopped != show_stopped {
                    show_stopped = config.show_stopped;
                    inner.tick();
                }
            }
        })
    }
}

/// Snapshot cache for one resource kind
#[derive(Debug)]
pub struct ResourceCache<R: Normalize> {
    inner: Arc<Inner<R>>,
}

impl<R: Normalize> ResourceCache<R> {
    pub fn new(executor: Arc<dyn Executor>, config: ConfigHolder) -> Self {
        let (sender, receiver) = watch::channel(Arc::new(Snapshot::empty()));
        Self {
            inner: Arc::new(Inner {
                executor,
                config,
                sender: Mutex::new(Some(sender)),
                receiver,
                refreshing: AtomicBool::new(false),
                refresh_done: Notify::new(),
                last_outcome: Mutex::new(None),
                initial_lookup: OnceCell::new(),
                disposed: AtomicBool::new(false),
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        R::KIND
    }

    /// Start polling at the configured interval and follow settings changes.
    /// The first tick fires immediately. Calling it again restarts the timer.
    pub fn start(&self) {
        if self.is_disposed() {
            return;
        }
        let mut tasks = lock(&self.inner.tasks);
        if tasks.config_watch.is_none() {
            tasks.config_watch = Some(self.inner.spawn_config_watch());
        }
        let period = self.inner.config.current().poll_interval();
        self.inner.restart_timer(&mut tasks, period);
    }

    /// On-demand refresh. Coalesces with a refresh already in flight.
    #[instrument(skip(self), fields(kind = %R::KIND))]
    pub async fn refresh(&self) -> Result<(), CacheError> {
        self.inner.refresh().await
    }

    /// Current snapshot, never triggers a refresh
    pub fn snapshot(&self) -> Arc<Snapshot<R>> {
        Arc::clone(&self.inner.receiver.borrow())
    }

    /// Current snapshot, populating it once if nothing has been loaded yet
    pub async fn list(&self) -> Arc<Snapshot<R>> {
        self.ensure_populated().await;
        self.snapshot()
    }

    /// Resolve a resource by identity key or name against the snapshot
    pub async fn get(&self, key: &str) -> Option<R> {
        self.ensure_populated().await;
        self.snapshot()
            .items
            .iter()
            .find(|item| item.matches(key))
            .cloned()
    }

    async fn ensure_populated(&self) {
        if self.snapshot().is_populated() || self.is_disposed() {
            return;
        }
        // concurrent first lookups all wait on the same populate attempt
        self.inner
            .initial_lookup
            .get_or_init(|| async {
                if let Err(error) = self.inner.refresh().await {
                    debug!(kind = %R::KIND, %error, "Initial lookup refresh failed");
                }
            })
            .await;
    }

    /// Subscribe to snapshots published after this call
    pub fn subscribe(&self) -> SnapshotSubscription<R> {
        let mut receiver = self.inner.receiver.clone();
        receiver.borrow_and_update();
        SnapshotSubscription { receiver }
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Cancel the timer and settings watcher and close subscriptions.
    /// Only the first call has any effect.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.inner.tasks).abort_all();
        lock(&self.inner.sender).take();
        info!(kind = %R::KIND, "Cache disposed");
    }
}

impl<R: Normalize> Drop for ResourceCache<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}
