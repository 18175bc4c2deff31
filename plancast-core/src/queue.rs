//! Queue item wire types shared with the collection store boundary.
//!
//! Items are created by a producer outside this core, mutated (status and
//! error message only) by the queue consumer, and deleted by an external
//! clearing operation. Bulk listings withhold the plan payload; it is only
//! returned on single-item fetch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a queued build item.
///
/// Items move `pending → building → {done | error}`. Terminal states are
/// clearable but never re-entered without external re-enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting to be picked up.
    Pending,
    /// Currently being materialized.
    Building,
    /// Materialized successfully.
    Done,
    /// Failed; see the item's error message.
    Error,
}

impl ItemStatus {
    /// Whether this status ends the item's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Building => "building",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One queue item as it appears in bulk listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Human-readable item name.
    pub name: String,
    /// Current lifecycle status.
    pub status: ItemStatus,
    /// Processing order; lower values build first.
    pub order: i64,
    /// First fatal cause, present when the status is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A queue item fetched individually, including its plan payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItemDetail {
    /// The listing fields.
    #[serde(flatten)]
    pub record: QueueItemRecord,
    /// Opaque serialized build plan.
    pub plan: String,
}

/// Producer-side shape for enqueuing a new item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItemDraft {
    /// Human-readable item name.
    pub name: String,
    /// Opaque serialized build plan.
    pub plan: String,
    /// Processing order; lower values build first.
    pub order: i64,
}

/// Status transition written back to the store, keyed by item and site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    /// The status to write.
    pub status: ItemStatus,
    /// Failure message, for `error` transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StatusPatch {
    /// Mark an item as being built.
    #[must_use]
    pub const fn building() -> Self {
        Self {
            status: ItemStatus::Building,
            error_message: None,
        }
    }

    /// Mark an item as built successfully.
    #[must_use]
    pub const fn done() -> Self {
        Self {
            status: ItemStatus::Done,
            error_message: None,
        }
    }

    /// Mark an item as failed with the first fatal cause.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Error,
            error_message: Some(message.into()),
        }
    }
}
