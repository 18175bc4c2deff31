//! Plan execution: validate, resolve the anchor, apply styles, materialize.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use plancast_core::{validate, BuildPlan};

use crate::capability::CanvasCapability;
use crate::styles::StyleApplier;
use crate::tree::TreeMaterializer;
use crate::ProgressSink;

/// Outcome of executing one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    /// Whether every stage completed.
    pub success: bool,
    /// Elements fully configured on the canvas.
    pub elements_created: usize,
    /// Styles newly created on the canvas.
    pub styles_created: usize,
    /// Styles that already existed and were skipped.
    pub styles_skipped: usize,
    /// Wall-clock execution time in milliseconds.
    pub elapsed_ms: u64,
    /// First fatal cause, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildResult {
    /// A failure recorded before any execution started, e.g. an
    /// unparseable plan payload.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            elements_created: 0,
            styles_created: 0,
            styles_skipped: 0,
            elapsed_ms: 0,
            error: Some(error.into()),
        }
    }
}

/// Drives a plan through validation, style application and tree
/// materialization.
///
/// `execute` is total: it never fails as a function. Every failure path
/// returns a [`BuildResult`] with `success = false` and whatever counts
/// accumulated before the failure, so callers can report partial progress.
pub struct PlanExecutor {
    canvas: Arc<dyn CanvasCapability>,
    progress: Option<ProgressSink>,
}

impl PlanExecutor {
    /// Create an executor over the given canvas.
    #[must_use]
    pub fn new(canvas: Arc<dyn CanvasCapability>) -> Self {
        Self {
            canvas,
            progress: None,
        }
    }

    /// Stream human-readable status lines to the given sink.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Execute one plan document.
    #[tracing::instrument(name = "execute_plan", skip_all, fields(section = %plan.section_name))]
    pub async fn execute(&self, plan: &BuildPlan) -> BuildResult {
        let started = Instant::now();

        let validated = match validate(plan) {
            Ok(validated) => validated,
            Err(error) => {
                tracing::warn!(%error, "plan rejected");
                return BuildResult {
                    success: false,
                    elements_created: 0,
                    styles_created: 0,
                    styles_skipped: 0,
                    elapsed_ms: elapsed_ms(started),
                    error: Some(error.to_string()),
                };
            }
        };
        self.emit(&format!("plan {} validated", validated.section_name()));

        // Anchor resolution is best-effort; building proceeds without one.
        let anchor = match self.canvas.selected_element().await {
            Ok(anchor) => anchor,
            Err(error) => {
                tracing::warn!(%error, "could not resolve insertion anchor");
                None
            }
        };

        let mut applier = StyleApplier::new(self.canvas.as_ref());
        if let Some(sink) = &self.progress {
            applier = applier.with_progress(sink);
        }
        let styles = match applier.apply(validated.styles()).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                tracing::error!(error = %failure, "style stage failed");
                return BuildResult {
                    success: false,
                    elements_created: 0,
                    styles_created: failure.partial.created,
                    styles_skipped: failure.partial.skipped,
                    elapsed_ms: elapsed_ms(started),
                    error: Some(failure.to_string()),
                };
            }
        };

        let mut materializer = TreeMaterializer::new(self.canvas.as_ref());
        if let Some(sink) = &self.progress {
            materializer = materializer.with_progress(sink);
        }
        match materializer.build(validated.tree(), anchor).await {
            Ok(tree) => {
                let result = BuildResult {
                    success: true,
                    elements_created: tree.count,
                    styles_created: styles.created,
                    styles_skipped: styles.skipped,
                    elapsed_ms: elapsed_ms(started),
                    error: None,
                };
                tracing::info!(
                    elements = tree.count,
                    styles = styles.created,
                    elapsed_ms = result.elapsed_ms,
                    "plan built"
                );
                self.emit(&format!(
                    "built {} elements in {}ms",
                    tree.count, result.elapsed_ms
                ));
                result
            }
            Err(failure) => {
                tracing::error!(error = %failure, "tree stage failed");
                BuildResult {
                    success: false,
                    elements_created: failure.count,
                    styles_created: styles.created,
                    styles_skipped: styles.skipped,
                    elapsed_ms: elapsed_ms(started),
                    error: Some(failure.to_string()),
                }
            }
        }
    }

    fn emit(&self, line: &str) {
        if let Some(sink) = &self.progress {
            sink(line);
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // A build does not run for 584 million years
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
