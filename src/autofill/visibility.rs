use crate::core::DocumentQuery;
use crate::types::{ElementSnapshot, NodeHandle};

/// Interactable: attached, has a layout box, not disabled.
pub fn snapshot_is_interactable(snapshot: &ElementSnapshot) -> bool {
    snapshot.rect.is_some() && !snapshot.disabled
}

/// Every locator gates acceptance on this. Read errors count as "no".
pub async fn is_interactable<D: DocumentQuery + ?Sized>(doc: &D, node: Option<NodeHandle>) -> bool {
    let Some(node) = node else {
        return false;
    };
    match doc.describe(node).await {
        Ok(Some(snapshot)) => snapshot_is_interactable(&snapshot),
        Ok(None) => false,
        Err(err) => {
            tracing::debug!(node = %node, error = %err, "visibility check failed");
            false
        }
    }
}

/// Snapshot of `node` if, and only if, it is interactable.
pub async fn interactable_snapshot<D: DocumentQuery + ?Sized>(
    doc: &D,
    node: NodeHandle,
) -> Option<ElementSnapshot> {
    match doc.describe(node).await {
        Ok(Some(snapshot)) if snapshot_is_interactable(&snapshot) => Some(snapshot),
        _ => None,
    }
}
