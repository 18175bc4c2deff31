//! # Plancast Runtime
//!
//! The asynchronous engine that materializes validated build plans onto a
//! design canvas, driven by a single-consumer queue.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              plancast-runtime               │
//! ├─────────────────────────────────────────────┤
//! │  PlanExecutor     │  QueueConsumer          │
//! │  - validate       │  - pending → building   │
//! │  - StyleApplier   │  - one item per tick    │
//! │  - Materializer   │  - poll loop            │
//! ├─────────────────────────────────────────────┤
//! │  Capabilities     │  SnapshotResponder      │
//! │  - canvas trait   │  - per-site requests    │
//! │  - store trait    │  - bounded traversal    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The canvas and the collection store are injected as trait objects at
//! construction, so tests and local development substitute the in-memory
//! backends in [`memory`] for the live external runtime.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod consumer;
pub mod executor;
pub mod memory;
pub mod snapshot;
pub mod styles;
pub mod tree;

pub use capability::{
    CanvasCapability, CanvasError, CollectionStore, ElementId, ElementInfo, Placement,
    StoreError, StyleId, StyleScope,
};
pub use consumer::{
    ConsumerConfig, ErrorObserver, ItemsObserver, PollerHandle, QueueConsumer, QueueError,
    TickOutcome, DEFAULT_POLL_INTERVAL,
};
pub use executor::{BuildResult, PlanExecutor};
pub use memory::{MemoryCanvas, MemoryStore};
pub use snapshot::{SnapshotConfig, SnapshotResponder};
pub use styles::{StyleApplier, StyleOutcome, StyleStageError};
pub use tree::{BuiltTree, TreeMaterializer, TreeStageError};

/// Observer-style sink for human-readable progress lines.
pub type ProgressSink = Box<dyn Fn(&str) + Send + Sync>;

/// Plancast runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
