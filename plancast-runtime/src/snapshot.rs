//! Out-of-band canvas introspection, layered over the poll loop.
//!
//! A requester marks a per-site pending flag; the canvas-holding process
//! services flags on every consumer tick, capturing a depth-bounded textual
//! traversal of the canvas tree plus every global style name; the requester
//! then polls for the completed snapshot. No persistent connection is
//! assumed anywhere in the protocol.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;

use plancast_core::SnapshotPayload;

use crate::capability::{CanvasCapability, CanvasError, ElementId};

/// Characters of element text shown per summary line.
const TEXT_PREVIEW_LEN: usize = 40;

/// Bounds and lifetimes for snapshot capture.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// How long a request stays serviceable.
    pub request_ttl: Duration,
    /// How long a completed snapshot stays fresh.
    pub snapshot_ttl: Duration,
    /// Maximum traversal depth, counting roots as depth 1.
    pub max_depth: usize,
    /// Children expanded per level; the remainder is summarized as a count.
    pub max_children: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            request_ttl: Duration::from_secs(90),
            snapshot_ttl: Duration::from_secs(300),
            max_depth: 5,
            max_children: 10,
        }
    }
}

/// Services snapshot requests against the canvas.
///
/// The per-site maps are process-local; all mutation happens on the
/// consumer's tick path, with requesters touching them only through
/// [`request`](Self::request) and [`poll`](Self::poll).
pub struct SnapshotResponder {
    canvas: Arc<dyn CanvasCapability>,
    config: SnapshotConfig,
    pending: Mutex<HashMap<String, Instant>>,
    ready: Mutex<HashMap<String, CachedSnapshot>>,
}

struct CachedSnapshot {
    payload: SnapshotPayload,
    captured_at: Instant,
}

impl SnapshotResponder {
    /// Create a responder with default bounds.
    #[must_use]
    pub fn new(canvas: Arc<dyn CanvasCapability>) -> Self {
        Self::with_config(canvas, SnapshotConfig::default())
    }

    /// Create a responder with explicit bounds.
    #[must_use]
    pub fn with_config(canvas: Arc<dyn CanvasCapability>, config: SnapshotConfig) -> Self {
        Self {
            canvas,
            config,
            pending: Mutex::new(HashMap::new()),
            ready: Mutex::new(HashMap::new()),
        }
    }

    /// Mark a site as wanting a snapshot.
    ///
    /// A repeated request refreshes the timestamp of the pending flag.
    pub fn request(&self, site_id: &str) {
        self.lock_pending()
            .insert(site_id.to_string(), Instant::now());
        tracing::debug!(site = site_id, "snapshot requested");
    }

    /// Fetch the completed snapshot for a site, if one is still fresh.
    ///
    /// Snapshots older than the configured TTL are discarded on read.
    #[must_use]
    pub fn poll(&self, site_id: &str) -> Option<SnapshotPayload> {
        let mut ready = self.lock_ready();
        match ready.get(site_id) {
            Some(cached) if cached.captured_at.elapsed() <= self.config.snapshot_ttl => {
                Some(cached.payload.clone())
            }
            Some(_) => {
                ready.remove(site_id);
                None
            }
            None => None,
        }
    }

    /// Service a site's request, if one is pending and unexpired.
    ///
    /// Called on every consumer tick. An expired request is dropped without
    /// capture; a capture failure leaves the flag set so the next tick
    /// retries. Stale completed snapshots for the site are pruned here too.
    pub async fn service(&self, site_id: &str) {
        self.prune(site_id);

        let Some(requested_at) = self.lock_pending().get(site_id).copied() else {
            return;
        };
        if requested_at.elapsed() > self.config.request_ttl {
            tracing::debug!(site = site_id, "snapshot request expired");
            self.lock_pending().remove(site_id);
            return;
        }

        match self.capture().await {
            Ok(payload) => {
                self.lock_ready().insert(
                    site_id.to_string(),
                    CachedSnapshot {
                        payload,
                        captured_at: Instant::now(),
                    },
                );
                self.lock_pending().remove(site_id);
                tracing::info!(site = site_id, "snapshot captured");
            }
            Err(error) => {
                tracing::warn!(site = site_id, %error, "snapshot capture failed, will retry");
            }
        }
    }

    /// Capture the bounded traversal plus global style names.
    async fn capture(&self) -> Result<SnapshotPayload, CanvasError> {
        let mut summary = String::new();

        let roots = self.canvas.root_children().await?;
        self.walk(&roots, 1, &mut summary).await?;

        let style_names = self.canvas.style_names().await?;
        if style_names.is_empty() {
            summary.push_str("styles: (none)");
        } else {
            let _ = write!(summary, "styles: {}", style_names.join(", "));
        }

        let page_info = self.canvas.page_info().await?;
        Ok(SnapshotPayload { summary, page_info })
    }

    /// Append one level of elements to the summary, recursing while under
    /// the depth bound.
    fn walk<'s>(
        &'s self,
        elements: &'s [ElementId],
        depth: usize,
        out: &'s mut String,
    ) -> BoxFuture<'s, Result<(), CanvasError>> {
        async move {
            let indent = "  ".repeat(depth - 1);
            let shown = elements.len().min(self.config.max_children);

            for element in &elements[..shown] {
                let info = self.canvas.describe(*element).await?;
                out.push_str(&indent);
                out.push_str("- ");
                out.push_str(&info.tag);
                if let Some(class) = &info.class_name {
                    out.push('.');
                    out.push_str(class);
                }
                if let Some(text) = &info.text {
                    let _ = write!(out, " {:?}", preview(text));
                }
                out.push('\n');

                let children = self.canvas.children_of(*element).await?;
                if children.is_empty() {
                    continue;
                }
                if depth >= self.config.max_depth {
                    let _ = writeln!(out, "{indent}  … {} nested", children.len());
                } else {
                    self.walk(&children, depth + 1, out).await?;
                }
            }

            if elements.len() > shown {
                let _ = writeln!(out, "{indent}… {} more", elements.len() - shown);
            }
            Ok(())
        }
        .boxed()
    }

    /// Drop a stale completed snapshot for the site.
    fn prune(&self, site_id: &str) {
        let mut ready = self.lock_ready();
        let stale = ready
            .get(site_id)
            .is_some_and(|cached| cached.captured_at.elapsed() > self.config.snapshot_ttl);
        if stale {
            ready.remove(site_id);
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ready(&self) -> MutexGuard<'_, HashMap<String, CachedSnapshot>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// First [`TEXT_PREVIEW_LEN`] characters of a text, with an ellipsis when cut.
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TEXT_PREVIEW_LEN).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
