//! Injected interfaces to the external canvas and collection store.
//!
//! Both collaborators are reached through trait objects handed in at
//! construction (`Arc<dyn CanvasCapability>`, `Arc<dyn CollectionStore>`),
//! never through ambient globals. The in-memory implementations live in
//! [`crate::memory`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use plancast_core::{
    PageInfo, PropertyMap, QueueItemDetail, QueueItemDraft, QueueItemRecord, StatusPatch,
};

/// Unique handle to an element that exists on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(Uuid);

impl ElementId {
    /// Create a new unique element handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique handle to a named style defined on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleId(Uuid);

impl StyleId {
    /// Create a new unique style handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for StyleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a new element is placed relative to existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Append under the canvas root.
    UnderRoot,
    /// Append as the last child of an existing element.
    LastChildOf(ElementId),
    /// Insert immediately after an existing element, as its sibling.
    After(ElementId),
}

/// Which scope a batch of style properties applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleScope {
    /// The unprefixed base scope.
    Base,
    /// A responsive breakpoint, by identifier.
    Breakpoint(String),
    /// A pseudo state, by identifier.
    Pseudo(String),
}

impl fmt::Display for StyleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Breakpoint(id) => write!(f, "breakpoint {id}"),
            Self::Pseudo(id) => write!(f, "pseudo {id}"),
        }
    }
}

/// Read-side description of a canvas element, used by snapshots.
#[derive(Debug, Clone, Default)]
pub struct ElementInfo {
    /// Tag the element renders with.
    pub tag: String,
    /// Class applied to the element, if any.
    pub class_name: Option<String>,
    /// Text content, if any.
    pub text: Option<String>,
}

/// Errors produced by the canvas capability.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Element not found on the canvas.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Style not found on the canvas.
    #[error("style not found: {0}")]
    StyleNotFound(String),

    /// A canvas operation was rejected.
    #[error("canvas operation failed: {0}")]
    Operation(String),

    /// The connection to the canvas process is gone.
    #[error("canvas connection lost: {0}")]
    ConnectionLost(String),
}

impl CanvasError {
    /// Whether the failure dooms every subsequent canvas call.
    ///
    /// Fatal errors abort a build stage; anything else is absorbed at the
    /// level of the style or subtree that hit it.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

/// Errors produced by the collection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested item does not exist for the site.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// The store could not be reached or rejected the call.
    #[error("store transport error: {0}")]
    Transport(String),

    /// A payload could not be serialized or deserialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The external collaborator that creates and mutates visual elements and
/// named styles.
///
/// Implementations are expected to be cheap to call concurrently from one
/// task; the engine never issues overlapping mutations.
#[async_trait]
pub trait CanvasCapability: Send + Sync {
    /// Create an element at the given placement.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] if the placement refers to
    /// an element that does not exist.
    async fn create_element(&self, placement: Placement) -> Result<ElementId, CanvasError>;

    /// Set the tag an element renders with.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the element is gone or the tag rejected.
    async fn set_tag(&self, element: ElementId, tag: &str) -> Result<(), CanvasError>;

    /// Set an element's text content.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the element is gone or the call fails.
    async fn set_text(&self, element: ElementId, text: &str) -> Result<(), CanvasError>;

    /// Set an element's link target.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the element is gone or the call fails.
    async fn set_link(&self, element: ElementId, href: &str) -> Result<(), CanvasError>;

    /// Set an element's image source and alt text.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the element is gone or the call fails.
    async fn set_image(&self, element: ElementId, src: &str, alt: &str)
        -> Result<(), CanvasError>;

    /// Set a custom attribute on an element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the element is gone or the call fails.
    async fn set_attribute(
        &self,
        element: ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), CanvasError>;

    /// Look up a style by name in the canvas's global namespace.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the canvas cannot be reached.
    async fn find_style(&self, name: &str) -> Result<Option<StyleId>, CanvasError>;

    /// Create a named style.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Operation`] if a style of that name already
    /// exists.
    async fn create_style(&self, name: &str) -> Result<StyleId, CanvasError>;

    /// Apply a batch of properties to a style under the given scope.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::StyleNotFound`] if the style is gone.
    async fn set_style_properties(
        &self,
        style: StyleId,
        scope: &StyleScope,
        properties: &PropertyMap,
    ) -> Result<(), CanvasError>;

    /// Apply a named style to an element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the element or style is gone.
    async fn apply_style(&self, element: ElementId, style: StyleId) -> Result<(), CanvasError>;

    /// The element currently selected in the canvas UI, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the selection cannot be read.
    async fn selected_element(&self) -> Result<Option<ElementId>, CanvasError>;

    /// Root-level elements in document order.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the canvas cannot be read.
    async fn root_children(&self) -> Result<Vec<ElementId>, CanvasError>;

    /// Children of an element in document order.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] if the element is gone.
    async fn children_of(&self, element: ElementId) -> Result<Vec<ElementId>, CanvasError>;

    /// Read-side description of an element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] if the element is gone.
    async fn describe(&self, element: ElementId) -> Result<ElementInfo, CanvasError>;

    /// Names of every globally defined style, in definition order.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the canvas cannot be read.
    async fn style_names(&self) -> Result<Vec<String>, CanvasError>;

    /// Identity of the open page, when the canvas exposes one.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError`] if the canvas cannot be read.
    async fn page_info(&self) -> Result<Option<PageInfo>, CanvasError>;
}

/// The external collaborator that persists queue items, keyed per site.
///
/// The consumer uses only `list_items`, `get_item` and `update_status`;
/// `create_item` and `delete_item` complete the interface for producers and
/// the external clearing operation.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// List a site's items. Plan payloads are withheld from listings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    async fn list_items(&self, site_id: &str) -> Result<Vec<QueueItemRecord>, StoreError>;

    /// Fetch one item including its plan payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] if the item does not exist.
    async fn get_item(&self, site_id: &str, item_id: &str)
        -> Result<QueueItemDetail, StoreError>;

    /// Create an item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    async fn create_item(
        &self,
        site_id: &str,
        draft: QueueItemDraft,
    ) -> Result<QueueItemRecord, StoreError>;

    /// Patch an item's status and error message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] if the item does not exist.
    async fn update_status(
        &self,
        site_id: &str,
        item_id: &str,
        patch: StatusPatch,
    ) -> Result<(), StoreError>;

    /// Delete an item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] if the item does not exist.
    async fn delete_item(&self, site_id: &str, item_id: &str) -> Result<(), StoreError>;
}
