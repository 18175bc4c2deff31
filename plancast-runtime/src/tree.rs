//! Recursive materialization of a validated element tree.

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;

use plancast_core::{ElementKind, ElementNode};

use crate::capability::{CanvasCapability, CanvasError, ElementId, Placement};
use crate::ProgressSink;

/// A successfully materialized tree.
#[derive(Debug, Clone, Copy)]
pub struct BuiltTree {
    /// The root element created on the canvas.
    pub root: ElementId,
    /// Fully configured elements: the root plus successfully built
    /// descendants.
    pub count: usize,
}

/// Fatal abort of the tree stage.
#[derive(Debug, Error)]
#[error("tree stage aborted: {source}")]
pub struct TreeStageError {
    /// Elements fully configured before the abort.
    pub count: usize,
    /// The failure that stopped the stage.
    #[source]
    pub source: CanvasError,
}

/// Outcome of building one node and its subtree.
struct NodeOutcome {
    element: ElementId,
    count: usize,
}

/// Failure inside one subtree, with the count it managed before failing.
struct NodeFailure {
    count: usize,
    source: CanvasError,
}

/// Materializes element trees onto the canvas.
pub struct TreeMaterializer<'a> {
    canvas: &'a dyn CanvasCapability,
    progress: Option<&'a ProgressSink>,
}

impl<'a> TreeMaterializer<'a> {
    /// Create a materializer over the given canvas.
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

    /// Materialize a tree.
    ///
    /// With an anchor the root is inserted immediately after it; without
    /// one it is appended under the canvas root. Descendants are always
    /// appended as the last child of their already-materialized parent.
    ///
    /// A non-fatal failure inside one subtree is logged with the child's
    /// and the parent's class name and does not abort the remaining
    /// siblings.
    ///
    /// # Errors
    ///
    /// Returns [`TreeStageError`] if the root itself cannot be built, or if
    /// the canvas connection is lost mid-tree; the error carries the count
    /// of elements fully configured before the abort.
    pub async fn build(
        &self,
        node: &ElementNode,
        anchor: Option<ElementId>,
    ) -> Result<BuiltTree, TreeStageError> {
        let placement = match anchor {
            Some(anchor) => Placement::After(anchor),
            None => Placement::UnderRoot,
        };
        match self.build_node(node, placement, 0).await {
            Ok(outcome) => Ok(BuiltTree {
                root: outcome.element,
                count: outcome.count,
            }),
            Err(failure) => Err(TreeStageError {
                count: failure.count,
                source: failure.source,
            }),
        }
    }

    /// Build one node, configure it, then recurse into its children.
    fn build_node<'n>(
        &'n self,
        node: &'n ElementNode,
        placement: Placement,
        depth: usize,
    ) -> BoxFuture<'n, Result<NodeOutcome, NodeFailure>> {
        async move {
            let element = self
                .configure(node, placement)
                .await
                .map_err(|source| NodeFailure { count: 0, source })?;

            let mut count = 1;
            self.emit(depth, &node.class_name);

            for child in &node.children {
                match self
                    .build_node(child, Placement::LastChildOf(element), depth + 1)
                    .await
                {
                    Ok(outcome) => count += outcome.count,
                    Err(failure) if failure.source.is_fatal() => {
                        return Err(NodeFailure {
                            count: count + failure.count,
                            source: failure.source,
                        });
                    }
                    Err(failure) => {
                        tracing::warn!(
                            child = %child.class_name,
                            parent = %node.class_name,
                            error = %failure.source,
                            "skipping subtree, continuing with siblings"
                        );
                    }
                }
            }

            Ok(NodeOutcome { element, count })
        }
        .boxed()
    }

    /// Create the element and apply everything the node declares.
    async fn configure(
        &self,
        node: &ElementNode,
        placement: Placement,
    ) -> Result<ElementId, CanvasError> {
        let element = self.canvas.create_element(placement).await?;
        self.canvas.set_tag(element, &node.tag()).await?;

        match self.canvas.find_style(&node.class_name).await? {
            Some(style) => self.canvas.apply_style(element, style).await?,
            None => {
                tracing::warn!(class = %node.class_name, "no style with this name on the canvas");
            }
        }

        if let Some(text) = &node.text {
            self.canvas.set_text(element, text).await?;
        }
        if node.kind.takes_href() {
            if let Some(href) = &node.href {
                self.canvas.set_link(element, href).await?;
            }
        }
        if node.kind == ElementKind::Image {
            if let (Some(src), Some(alt)) = (&node.src, &node.alt) {
                self.canvas.set_image(element, src, alt).await?;
            }
        }
        for attribute in &node.attributes {
            self.canvas
                .set_attribute(element, &attribute.name, &attribute.value)
                .await?;
        }

        Ok(element)
    }

    fn emit(&self, depth: usize, class_name: &str) {
        if let Some(sink) = self.progress {
            sink(&format!("{}built {class_name}", "  ".repeat(depth)));
        }
    }
}
