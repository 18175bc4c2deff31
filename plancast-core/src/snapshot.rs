//! Snapshot payloads for the canvas introspection side channel.

use serde::{Deserialize, Serialize};

/// Identity of the page currently open on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Page name.
    pub name: String,
    /// Page identifier.
    pub id: String,
}

/// A completed canvas snapshot.
///
/// The summary is a depth-bounded textual traversal of the canvas's element
/// tree followed by the name of every globally defined style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    /// Human-readable canvas summary.
    pub summary: String,
    /// Page identity, when the canvas exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
}
