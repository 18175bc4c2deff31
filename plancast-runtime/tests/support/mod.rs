//! Shared test doubles: failure-injecting wrappers around the in-memory
//! backends.

#![allow(dead_code)] // not every test binary uses every knob

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use plancast_core::{
    PageInfo, PropertyMap, QueueItemDetail, QueueItemDraft, QueueItemRecord, StatusPatch,
};
use plancast_runtime::{
    CanvasCapability, CanvasError, CollectionStore, ElementId, ElementInfo, MemoryCanvas,
    MemoryStore, Placement, StoreError, StyleId, StyleScope,
};

/// Route engine tracing to the test writer when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Canvas wrapper that fails selected operations on demand.
pub struct FlakyCanvas {
    inner: Arc<MemoryCanvas>,
    fail_tags: Mutex<HashSet<String>>,
    fail_styles: Mutex<HashSet<String>>,
    fail_selection: AtomicBool,
    creates_before_disconnect: Mutex<Option<usize>>,
    disconnected: AtomicBool,
}

impl FlakyCanvas {
    pub fn new(inner: Arc<MemoryCanvas>) -> Self {
        Self {
            inner,
            fail_tags: Mutex::new(HashSet::new()),
            fail_styles: Mutex::new(HashSet::new()),
            fail_selection: AtomicBool::new(false),
            creates_before_disconnect: Mutex::new(None),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Make `set_tag` fail for the given tag.
    pub fn fail_tag(&self, tag: &str) {
        self.fail_tags.lock().unwrap().insert(tag.to_string());
    }

    /// Make `create_style` fail for the given name.
    pub fn fail_style(&self, name: &str) {
        self.fail_styles.lock().unwrap().insert(name.to_string());
    }

    /// Make `selected_element` fail.
    pub fn fail_selection(&self) {
        self.fail_selection.store(true, Ordering::SeqCst);
    }

    /// Allow this many more `create_element` calls, then drop the connection.
    pub fn disconnect_after_creates(&self, remaining: usize) {
        *self.creates_before_disconnect.lock().unwrap() = Some(remaining);
    }

    /// Drop the connection immediately.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    fn check_connection(&self) -> Result<(), CanvasError> {
        if self.disconnected.load(Ordering::SeqCst) {
            Err(CanvasError::ConnectionLost("test disconnect".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CanvasCapability for FlakyCanvas {
    async fn create_element(&self, placement: Placement) -> Result<ElementId, CanvasError> {
        self.check_connection()?;
        {
            let mut remaining = self.creates_before_disconnect.lock().unwrap();
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    self.disconnected.store(true, Ordering::SeqCst);
                    return Err(CanvasError::ConnectionLost("test disconnect".to_string()));
                }
                *left -= 1;
            }
        }
        self.inner.create_element(placement).await
    }

    async fn set_tag(&self, element: ElementId, tag: &str) -> Result<(), CanvasError> {
        self.check_connection()?;
        if self.fail_tags.lock().unwrap().contains(tag) {
            return Err(CanvasError::Operation(format!("tag rejected: {tag}")));
        }
        self.inner.set_tag(element, tag).await
    }

    async fn set_text(&self, element: ElementId, text: &str) -> Result<(), CanvasError> {
        self.check_connection()?;
        self.inner.set_text(element, text).await
    }

    async fn set_link(&self, element: ElementId, href: &str) -> Result<(), CanvasError> {
        self.check_connection()?;
        self.inner.set_link(element, href).await
    }

    async fn set_image(
        &self,
        element: ElementId,
        src: &str,
        alt: &str,
    ) -> Result<(), CanvasError> {
        self.check_connection()?;
        self.inner.set_image(element, src, alt).await
    }

    async fn set_attribute(
        &self,
        element: ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), CanvasError> {
        self.check_connection()?;
        self.inner.set_attribute(element, name, value).await
    }

    async fn find_style(&self, name: &str) -> Result<Option<StyleId>, CanvasError> {
        self.check_connection()?;
        self.inner.find_style(name).await
    }

    async fn create_style(&self, name: &str) -> Result<StyleId, CanvasError> {
        self.check_connection()?;
        if self.fail_styles.lock().unwrap().contains(name) {
            return Err(CanvasError::Operation(format!("style rejected: {name}")));
        }
        self.inner.create_style(name).await
    }

    async fn set_style_properties(
        &self,
        style: StyleId,
        scope: &StyleScope,
        properties: &PropertyMap,
    ) -> Result<(), CanvasError> {
        self.check_connection()?;
        self.inner.set_style_properties(style, scope, properties).await
    }

    async fn apply_style(&self, element: ElementId, style: StyleId) -> Result<(), CanvasError> {
        self.check_connection()?;
        self.inner.apply_style(element, style).await
    }

    async fn selected_element(&self) -> Result<Option<ElementId>, CanvasError> {
        self.check_connection()?;
        if self.fail_selection.load(Ordering::SeqCst) {
            return Err(CanvasError::Operation("selection unavailable".to_string()));
        }
        self.inner.selected_element().await
    }

    async fn root_children(&self) -> Result<Vec<ElementId>, CanvasError> {
        self.check_connection()?;
        self.inner.root_children().await
    }

    async fn children_of(&self, element: ElementId) -> Result<Vec<ElementId>, CanvasError> {
        self.check_connection()?;
        self.inner.children_of(element).await
    }

    async fn describe(&self, element: ElementId) -> Result<ElementInfo, CanvasError> {
        self.check_connection()?;
        self.inner.describe(element).await
    }

    async fn style_names(&self) -> Result<Vec<String>, CanvasError> {
        self.check_connection()?;
        self.inner.style_names().await
    }

    async fn page_info(&self) -> Result<Option<PageInfo>, CanvasError> {
        self.check_connection()?;
        self.inner.page_info().await
    }
}

/// Store wrapper that fails selected operations on demand.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_list: AtomicBool,
    fail_terminal_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_list: AtomicBool::new(false),
            fail_terminal_writes: AtomicBool::new(false),
        }
    }

    /// Make `list_items` fail.
    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    /// Make writes of terminal statuses (done/error) fail.
    pub fn fail_terminal_writes(&self) {
        self.fail_terminal_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CollectionStore for FlakyStore {
    async fn list_items(&self, site_id: &str) -> Result<Vec<QueueItemRecord>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("list unavailable".to_string()));
        }
        self.inner.list_items(site_id).await
    }

    async fn get_item(
        &self,
        site_id: &str,
        item_id: &str,
    ) -> Result<QueueItemDetail, StoreError> {
        self.inner.get_item(site_id, item_id).await
    }

    async fn create_item(
        &self,
        site_id: &str,
        draft: QueueItemDraft,
    ) -> Result<QueueItemRecord, StoreError> {
        self.inner.create_item(site_id, draft).await
    }

    async fn update_status(
        &self,
        site_id: &str,
        item_id: &str,
        patch: StatusPatch,
    ) -> Result<(), StoreError> {
        if patch.status.is_terminal() && self.fail_terminal_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("patch unavailable".to_string()));
        }
        self.inner.update_status(site_id, item_id, patch).await
    }

    async fn delete_item(&self, site_id: &str, item_id: &str) -> Result<(), StoreError> {
        self.inner.delete_item(site_id, item_id).await
    }
}
