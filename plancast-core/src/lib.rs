//! # Plancast Core
//!
//! Data model and validation for declarative section build plans.
//! An external agent describes one page section as a [`BuildPlan`]; a
//! separate canvas-holding process materializes it later, asynchronously.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               plancast-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Plan Documents   │  Validator              │
//! │  - ElementNode    │  - grammar + slugs      │
//! │  - StyleDef       │  - shorthand denylist   │
//! │  - wire shapes    │  - depth / kind rules   │
//! ├─────────────────────────────────────────────┤
//! │  Queue wire types │  Snapshot wire types    │
//! │  - item records   │  - page info            │
//! │  - status patches │  - canvas summaries     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure and synchronous. The asynchronous engine that
//! consumes validated plans lives in `plancast-runtime`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod plan;
pub mod queue;
pub mod snapshot;
pub mod validate;

pub use plan::{
    Attribute, BuildPlan, ElementKind, ElementNode, PropertyMap, StyleDef, BREAKPOINTS,
    MAX_TREE_DEPTH, PLAN_VERSION, PSEUDO_STATES, SHORTHAND_PROPERTIES,
};
pub use queue::{ItemStatus, QueueItemDetail, QueueItemDraft, QueueItemRecord, StatusPatch};
pub use snapshot::{PageInfo, SnapshotPayload};
pub use validate::{validate, ValidatedPlan, ValidationError};

/// Plancast core version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
