//! In-memory canvas and store backends.
//!
//! Complete in-process implementations of the two capability traits, used
//! by tests and local development in place of a live canvas or store. Both
//! are `Sync` behind plain mutexes; the engine never issues overlapping
//! mutations, so there is no finer-grained locking to win.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use plancast_core::{
    ItemStatus, PageInfo, PropertyMap, QueueItemDetail, QueueItemDraft, QueueItemRecord,
    StatusPatch,
};

use crate::capability::{
    CanvasCapability, CanvasError, CollectionStore, ElementId, ElementInfo, Placement,
    StoreError, StyleId, StyleScope,
};

/// One element held by [`MemoryCanvas`].
#[derive(Debug, Clone, Default)]
struct MemoryElement {
    tag: String,
    class_name: Option<String>,
    text: Option<String>,
    href: Option<String>,
    src: Option<String>,
    alt: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<ElementId>,
}

/// One named style held by [`MemoryCanvas`].
#[derive(Debug, Clone)]
struct MemoryStyle {
    id: StyleId,
    name: String,
    /// Property batches in application order, with their scopes.
    batches: Vec<(StyleScope, PropertyMap)>,
}

#[derive(Debug, Default)]
struct CanvasInner {
    elements: HashMap<ElementId, MemoryElement>,
    roots: Vec<ElementId>,
    styles: Vec<MemoryStyle>,
    selected: Option<ElementId>,
    page: Option<PageInfo>,
}

/// In-memory [`CanvasCapability`] implementation.
#[derive(Debug, Default)]
pub struct MemoryCanvas {
    inner: Mutex<CanvasInner>,
}

impl MemoryCanvas {
    /// Create an empty canvas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page identity reported by snapshots.
    pub fn set_page(&self, page: PageInfo) {
        self.lock().page = Some(page);
    }

    /// Select an element, making it the insertion anchor.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] if the element does not
    /// exist.
    pub fn select(&self, element: ElementId) -> Result<(), CanvasError> {
        let mut inner = self.lock();
        if !inner.elements.contains_key(&element) {
            return Err(CanvasError::ElementNotFound(element.to_string()));
        }
        inner.selected = Some(element);
        Ok(())
    }

    /// Clear the selection.
    pub fn deselect(&self) {
        self.lock().selected = None;
    }

    /// Number of elements on the canvas.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.lock().elements.len()
    }

    /// Number of property batches recorded for a named style.
    #[must_use]
    pub fn style_batch_count(&self, name: &str) -> usize {
        self.lock()
            .styles
            .iter()
            .find(|style| style.name == name)
            .map_or(0, |style| style.batches.len())
    }

    fn lock(&self) -> MutexGuard<'_, CanvasInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_element<F, T>(&self, element: ElementId, f: F) -> Result<T, CanvasError>
    where
        F: FnOnce(&mut MemoryElement) -> T,
    {
        let mut inner = self.lock();
        let entry = inner
            .elements
            .get_mut(&element)
            .ok_or_else(|| CanvasError::ElementNotFound(element.to_string()))?;
        Ok(f(entry))
    }
}

#[async_trait]
impl CanvasCapability for MemoryCanvas {
    async fn create_element(&self, placement: Placement) -> Result<ElementId, CanvasError> {
        let mut inner = self.lock();
        let id = ElementId::new();
        match placement {
            Placement::UnderRoot => {
                inner.elements.insert(id, MemoryElement::default());
                inner.roots.push(id);
            }
            Placement::LastChildOf(parent) => {
                if !inner.elements.contains_key(&parent) {
                    return Err(CanvasError::ElementNotFound(parent.to_string()));
                }
                inner.elements.insert(id, MemoryElement::default());
                if let Some(entry) = inner.elements.get_mut(&parent) {
                    entry.children.push(id);
                }
            }
            Placement::After(anchor) => {
                if let Some(position) = inner.roots.iter().position(|root| *root == anchor) {
                    inner.elements.insert(id, MemoryElement::default());
                    inner.roots.insert(position + 1, id);
                } else {
                    let slot = inner.elements.iter().find_map(|(parent, entry)| {
                        entry
                            .children
                            .iter()
                            .position(|child| *child == anchor)
                            .map(|position| (*parent, position))
                    });
                    let Some((parent, position)) = slot else {
                        return Err(CanvasError::ElementNotFound(anchor.to_string()));
                    };
                    inner.elements.insert(id, MemoryElement::default());
                    if let Some(entry) = inner.elements.get_mut(&parent) {
                        entry.children.insert(position + 1, id);
                    }
                }
            }
        }
        Ok(id)
    }

    async fn set_tag(&self, element: ElementId, tag: &str) -> Result<(), CanvasError> {
        self.with_element(element, |entry| entry.tag = tag.to_string())
    }

    async fn set_text(&self, element: ElementId, text: &str) -> Result<(), CanvasError> {
        self.with_element(element, |entry| entry.text = Some(text.to_string()))
    }

    async fn set_link(&self, element: ElementId, href: &str) -> Result<(), CanvasError> {
        self.with_element(element, |entry| entry.href = Some(href.to_string()))
    }

    async fn set_image(
        &self,
        element: ElementId,
        src: &str,
        alt: &str,
    ) -> Result<(), CanvasError> {
        self.with_element(element, |entry| {
            entry.src = Some(src.to_string());
            entry.alt = Some(alt.to_string());
        })
    }

    async fn set_attribute(
        &self,
        element: ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), CanvasError> {
        self.with_element(element, |entry| {
            entry.attributes.push((name.to_string(), value.to_string()));
        })
    }

    async fn find_style(&self, name: &str) -> Result<Option<StyleId>, CanvasError> {
        Ok(self
            .lock()
            .styles
            .iter()
            .find(|style| style.name == name)
            .map(|style| style.id))
    }

    async fn create_style(&self, name: &str) -> Result<StyleId, CanvasError> {
        let mut inner = self.lock();
        if inner.styles.iter().any(|style| style.name == name) {
            return Err(CanvasError::Operation(format!(
                "style already exists: {name}"
            )));
        }
        let id = StyleId::new();
        inner.styles.push(MemoryStyle {
            id,
            name: name.to_string(),
            batches: Vec::new(),
        });
        Ok(id)
    }

    async fn set_style_properties(
        &self,
        style: StyleId,
        scope: &StyleScope,
        properties: &PropertyMap,
    ) -> Result<(), CanvasError> {
        let mut inner = self.lock();
        let entry = inner
            .styles
            .iter_mut()
            .find(|candidate| candidate.id == style)
            .ok_or_else(|| CanvasError::StyleNotFound(style.to_string()))?;
        entry.batches.push((scope.clone(), properties.clone()));
        Ok(())
    }

    async fn apply_style(&self, element: ElementId, style: StyleId) -> Result<(), CanvasError> {
        let name = {
            let inner = self.lock();
            inner
                .styles
                .iter()
                .find(|candidate| candidate.id == style)
                .map(|candidate| candidate.name.clone())
                .ok_or_else(|| CanvasError::StyleNotFound(style.to_string()))?
        };
        self.with_element(element, |entry| entry.class_name = Some(name))
    }

    async fn selected_element(&self) -> Result<Option<ElementId>, CanvasError> {
        Ok(self.lock().selected)
    }

    async fn root_children(&self) -> Result<Vec<ElementId>, CanvasError> {
        Ok(self.lock().roots.clone())
    }

    async fn children_of(&self, element: ElementId) -> Result<Vec<ElementId>, CanvasError> {
        self.with_element(element, |entry| entry.children.clone())
    }

    async fn describe(&self, element: ElementId) -> Result<ElementInfo, CanvasError> {
        self.with_element(element, |entry| ElementInfo {
            tag: entry.tag.clone(),
            class_name: entry.class_name.clone(),
            text: entry.text.clone(),
        })
    }

    async fn style_names(&self) -> Result<Vec<String>, CanvasError> {
        Ok(self
            .lock()
            .styles
            .iter()
            .map(|style| style.name.clone())
            .collect())
    }

    async fn page_info(&self) -> Result<Option<PageInfo>, CanvasError> {
        Ok(self.lock().page.clone())
    }
}

#[derive(Debug, Clone)]
struct StoredItem {
    record: QueueItemRecord,
    plan: String,
}

/// In-memory [`CollectionStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sites: Mutex<HashMap<String, Vec<StoredItem>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<StoredItem>>> {
        self.sites.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn list_items(&self, site_id: &str) -> Result<Vec<QueueItemRecord>, StoreError> {
        Ok(self
            .lock()
            .get(site_id)
            .map(|items| items.iter().map(|item| item.record.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_item(
        &self,
        site_id: &str,
        item_id: &str,
    ) -> Result<QueueItemDetail, StoreError> {
        self.lock()
            .get(site_id)
            .and_then(|items| items.iter().find(|item| item.record.id == item_id))
            .map(|item| QueueItemDetail {
                record: item.record.clone(),
                plan: item.plan.clone(),
            })
            .ok_or_else(|| StoreError::ItemNotFound(item_id.to_string()))
    }

    async fn create_item(
        &self,
        site_id: &str,
        draft: QueueItemDraft,
    ) -> Result<QueueItemRecord, StoreError> {
        let id = format!("item-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = QueueItemRecord {
            id,
            name: draft.name,
            status: ItemStatus::Pending,
            order: draft.order,
            error_message: None,
        };
        self.lock()
            .entry(site_id.to_string())
            .or_default()
            .push(StoredItem {
                record: record.clone(),
                plan: draft.plan,
            });
        Ok(record)
    }

    async fn update_status(
        &self,
        site_id: &str,
        item_id: &str,
        patch: StatusPatch,
    ) -> Result<(), StoreError> {
        let mut sites = self.lock();
        let item = sites
            .get_mut(site_id)
            .and_then(|items| items.iter_mut().find(|item| item.record.id == item_id))
            .ok_or_else(|| StoreError::ItemNotFound(item_id.to_string()))?;
        item.record.status = patch.status;
        item.record.error_message = patch.error_message;
        Ok(())
    }

    async fn delete_item(&self, site_id: &str, item_id: &str) -> Result<(), StoreError> {
        let mut sites = self.lock();
        let items = sites
            .get_mut(site_id)
            .ok_or_else(|| StoreError::ItemNotFound(item_id.to_string()))?;
        let before = items.len();
        items.retain(|item| item.record.id != item_id);
        if items.len() == before {
            return Err(StoreError::ItemNotFound(item_id.to_string()));
        }
        Ok(())
    }
}
