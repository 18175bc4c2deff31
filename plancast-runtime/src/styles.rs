//! Idempotent application of plan styles to the canvas.

use thiserror::Error;

use plancast_core::StyleDef;

use crate::capability::{CanvasCapability, CanvasError, StyleScope};
use crate::ProgressSink;

/// Tally of one style-application pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleOutcome {
    /// Styles newly created on the canvas.
    pub created: usize,
    /// Styles that already existed and were left untouched.
    pub skipped: usize,
}

/// Fatal abort of the style stage.
#[derive(Debug, Error)]
#[error("style stage aborted: {source}")]
pub struct StyleStageError {
    /// Counts accumulated before the abort.
    pub partial: StyleOutcome,
    /// The failure that stopped the stage.
    #[source]
    pub source: CanvasError,
}

/// Creates missing named styles, idempotently.
///
/// Styles already present on the canvas are skipped, never updated: the
/// canvas's global style namespace outlives any single plan, and a second
/// plan must not clobber what the first one defined.
pub struct StyleApplier<'a> {
    canvas: &'a dyn CanvasCapability,
    progress: Option<&'a ProgressSink>,
}

impl<'a> StyleApplier<'a> {
    /// Create an applier over the given canvas.
    #[must_use]
    pub const fn new(canvas: &'a dyn CanvasCapability) -> Self {
        Self {
            canvas,
            progress: None,
        }
    }

    /// Stream progress lines to the given sink.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Apply each style definition in plan order.
    ///
    /// A non-fatal failure on one style (lookup, creation or property
    /// application) is logged with the style name and does not abort the
    /// remaining styles; `created` tallies only full successes.
    ///
    /// # Errors
    ///
    /// Returns [`StyleStageError`] when the canvas connection is lost,
    /// carrying the partial tally.
    pub async fn apply(&self, styles: &[StyleDef]) -> Result<StyleOutcome, StyleStageError> {
        let mut outcome = StyleOutcome::default();
        for style in styles {
            match self.apply_one(style).await {
                Ok(true) => {
                    outcome.created += 1;
                    self.emit(&format!("created style {}", style.name));
                }
                Ok(false) => {
                    outcome.skipped += 1;
                    tracing::debug!(style = %style.name, "style already exists, skipping");
                }
                Err(source) if source.is_fatal() => {
                    return Err(StyleStageError {
                        partial: outcome,
                        source,
                    });
                }
                Err(error) => {
                    tracing::warn!(style = %style.name, %error, "style failed, continuing");
                    self.emit(&format!("style {} failed: {error}", style.name));
                }
            }
        }
        Ok(outcome)
    }

    /// Returns `true` if the style was created, `false` if it already existed.
    async fn apply_one(&self, style: &StyleDef) -> Result<bool, CanvasError> {
        if self.canvas.find_style(&style.name).await?.is_some() {
            return Ok(false);
        }

        let id = self.canvas.create_style(&style.name).await?;
        if !style.properties.is_empty() {
            self.canvas
                .set_style_properties(id, &StyleScope::Base, &style.properties)
                .await?;
        }
        for (breakpoint, properties) in &style.breakpoints {
            self.canvas
                .set_style_properties(id, &StyleScope::Breakpoint(breakpoint.clone()), properties)
                .await?;
        }
        for (pseudo, properties) in &style.pseudo {
            self.canvas
                .set_style_properties(id, &StyleScope::Pseudo(pseudo.clone()), properties)
                .await?;
        }
        Ok(true)
    }

    fn emit(&self, line: &str) {
        if let Some(sink) = self.progress {
            sink(line);
        }
    }
}
