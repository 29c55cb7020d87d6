//! Comment-node placeholder markers for extracted scripts.

use crate::dom::{Document, NodeData, NodeId};
use uuid::Uuid;

const MARKER_PREFIX: &str = "umbra-script:";

/// Fresh opaque token, unique per render call.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

/// Comment text for a marker carrying `token`.
pub fn marker_text(token: &str) -> String {
    format!("{MARKER_PREFIX}{token}")
}

/// The token carried by a marker comment, if it is one.
pub fn token_of(comment: &str) -> Option<&str> {
    comment.trim().strip_prefix(MARKER_PREFIX)
}

/// Locate the marker comment carrying `token` within `scope`.
pub fn find_marker(doc: &Document, scope: NodeId, token: &str) -> Option<NodeId> {
    doc.descendants(scope).into_iter().find(|&id| {
        matches!(doc.data(id), NodeData::Comment(text) if token_of(text) == Some(token))
    })
}
