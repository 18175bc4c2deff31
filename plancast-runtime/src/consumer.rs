//! Single-consumer queue state machine and its poll loop.
//!
//! Each item moves `pending → building → {done | error}`. The consumer
//! processes at most one item per tick, which bounds concurrent canvas
//! mutation to one build at a time — the chief correctness invariant of the
//! whole engine, since concurrent tree materialization against one canvas
//! would race.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use plancast_core::{BuildPlan, ItemStatus, QueueItemRecord, StatusPatch};

use crate::capability::{CollectionStore, StoreError};
use crate::executor::{BuildResult, PlanExecutor};
use crate::snapshot::SnapshotResponder;

/// Default interval between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Observer for queue listing updates.
pub type ItemsObserver = Box<dyn Fn(&[QueueItemRecord]) + Send + Sync>;

/// Observer for queue errors.
pub type ErrorObserver = Box<dyn Fn(&QueueError) + Send + Sync>;

/// A store failure during fetch or patch.
///
/// Reported to the error observer; the poll loop itself continues on the
/// next scheduled tick.
#[derive(Debug, Error)]
#[error("queue store error: {source}")]
pub struct QueueError {
    #[from]
    source: StoreError,
}

/// Poll loop configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Site whose queue this consumer drains.
    pub site_id: String,
    /// Interval between poll ticks.
    pub poll_interval: Duration,
}

impl ConsumerConfig {
    /// Configuration for a site with the default poll interval.
    #[must_use]
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// What a single [`QueueConsumer::process_next`] call did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// No pending items; nothing was touched.
    Idle,
    /// One item was driven to a terminal status.
    Processed {
        /// The processed item's id.
        item_id: String,
        /// The build outcome recorded on the item.
        result: BuildResult,
    },
}

/// Pulls pending items from the collection store and processes at most one
/// at a time through the executor.
pub struct QueueConsumer {
    store: Arc<dyn CollectionStore>,
    executor: PlanExecutor,
    config: ConsumerConfig,
    snapshots: Option<Arc<SnapshotResponder>>,
    on_items: Option<ItemsObserver>,
    on_error: Option<ErrorObserver>,
}

impl QueueConsumer {
    /// Create a consumer over the given store and executor.
    #[must_use]
    pub fn new(
        store: Arc<dyn CollectionStore>,
        executor: PlanExecutor,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            config,
            snapshots: None,
            on_items: None,
            on_error: None,
        }
    }

    /// Service the given snapshot responder on every tick.
    #[must_use]
    pub fn with_snapshots(mut self, responder: Arc<SnapshotResponder>) -> Self {
        self.snapshots = Some(responder);
        self
    }

    /// Publish the item listing to the given observer around each build.
    #[must_use]
    pub fn with_items_observer(mut self, observer: ItemsObserver) -> Self {
        self.on_items = Some(observer);
        self
    }

    /// Report queue errors to the given observer.
    #[must_use]
    pub fn with_error_observer(mut self, observer: ErrorObserver) -> Self {
        self.on_error = Some(observer);
        self
    }

    /// The site this consumer drains.
    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.config.site_id
    }

    /// Process the single most urgent pending item, if any.
    ///
    /// Selection: all items for the site, status `pending`, lowest `order`
    /// first (stable for ties). The selected item is marked `building`, its
    /// plan payload fetched and parsed, the plan executed, and the terminal
    /// status written back. Both terminal writes are best-effort: a persist
    /// failure is logged and never masks the build outcome. After
    /// processing, the listing is re-fetched and published to the items
    /// observer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the store fails during listing, the
    /// `building` transition, or the detail fetch. Later store failures are
    /// absorbed as described above.
    #[tracing::instrument(name = "process_next", skip_all, fields(site = %self.config.site_id))]
    pub async fn process_next(&self) -> Result<TickOutcome, QueueError> {
        let items = self.store.list_items(&self.config.site_id).await?;
        let mut pending: Vec<&QueueItemRecord> = items
            .iter()
            .filter(|item| item.status == ItemStatus::Pending)
            .collect();
        pending.sort_by_key(|item| item.order);
        let Some(next) = pending.first() else {
            tracing::trace!("no pending items");
            return Ok(TickOutcome::Idle);
        };
        let item_id = next.id.clone();
        tracing::info!(item = %item_id, name = %next.name, "processing queue item");

        self.store
            .update_status(&self.config.site_id, &item_id, StatusPatch::building())
            .await?;
        // Best-effort re-fetch so observers see the building transition.
        self.publish_items().await;

        // The plan payload is withheld from listings; fetch the full item.
        let detail = self.store.get_item(&self.config.site_id, &item_id).await?;
        let result = match BuildPlan::from_json(&detail.plan) {
            Ok(plan) => self.executor.execute(&plan).await,
            Err(error) => BuildResult::rejected(format!("could not parse plan payload: {error}")),
        };

        let patch = if result.success {
            StatusPatch::done()
        } else {
            StatusPatch::error(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "build failed".to_string()),
            )
        };
        if let Err(error) = self
            .store
            .update_status(&self.config.site_id, &item_id, patch)
            .await
        {
            tracing::warn!(item = %item_id, %error, "could not persist terminal status");
        }
        self.publish_items().await;

        Ok(TickOutcome::Processed { item_id, result })
    }

    /// Run one poll tick: service snapshot requests, then the queue.
    pub async fn tick(&self) {
        if let Some(responder) = &self.snapshots {
            responder.service(&self.config.site_id).await;
        }
        match self.process_next().await {
            Ok(TickOutcome::Idle) => {}
            Ok(TickOutcome::Processed { item_id, result }) => {
                tracing::debug!(item = %item_id, success = result.success, "tick complete");
            }
            Err(error) => {
                tracing::error!(%error, "queue tick failed");
                if let Some(observer) = &self.on_error {
                    observer(&error);
                }
            }
        }
    }

    /// Start the poll loop: an immediate tick, then one per interval.
    ///
    /// Stopping via the returned handle is cooperative and takes effect at
    /// the next tick boundary, never mid-build.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> PollerHandle {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let interval = self.config.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                self.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
            }
            tracing::debug!("poll loop stopped");
        });
        PollerHandle { running, task }
    }

    /// Re-fetch the listing and publish it to the items observer.
    async fn publish_items(&self) {
        let Some(observer) = &self.on_items else {
            return;
        };
        match self.store.list_items(&self.config.site_id).await {
            Ok(items) => observer(&items),
            Err(error) => tracing::warn!(%error, "could not refresh item listing"),
        }
    }
}

/// Handle to a running poll loop.
pub struct PollerHandle {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Ask the loop to stop at the next tick boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the loop is still scheduled to run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Wait for the loop task to finish. Call [`stop`](Self::stop) first.
    ///
    /// # Errors
    ///
    /// Returns the task's [`JoinError`](tokio::task::JoinError) if the loop
    /// panicked or was aborted.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}
