use crate::autofill::field::FieldSpec;
use crate::autofill::textual::CONTAINER;
use crate::autofill::visibility::interactable_snapshot;
use crate::core::DocumentQuery;
use crate::types::{ElementSnapshot, NodeHandle};

/// Last resort. Walk every input that could hold this field's value and take
/// the first one that is empty, fits the field's length convention (any
/// length when the field has none) and sits in a container whose text names
/// the field.
pub async fn scan_inputs<D: DocumentQuery + ?Sized>(doc: &D, field: &FieldSpec) -> Option<NodeHandle> {
    let inputs = match doc.query_all(field.input_kind.selector()).await {
        Ok(inputs) => inputs,
        Err(err) => {
            tracing::debug!(field = %field.field_id, error = %err, "heuristic scan failed");
            return None;
        }
    };

    for input in inputs {
        let Some(snapshot) = interactable_snapshot(doc, input).await else {
            continue;
        };
        if !structurally_plausible(&snapshot, field) {
            continue;
        }
        if container_mentions_field(doc, input, field).await {
            return Some(input);
        }
    }

    None
}

fn structurally_plausible(snapshot: &ElementSnapshot, field: &FieldSpec) -> bool {
    if !field.input_kind.accepts(snapshot) || !snapshot.is_empty_value() {
        return false;
    }
    match field.max_length {
        Some(expected) => snapshot.max_length() == Some(expected),
        None => true,
    }
}

async fn container_mentions_field<D: DocumentQuery + ?Sized>(
    doc: &D,
    input: NodeHandle,
    field: &FieldSpec,
) -> bool {
    let Ok(Some(container)) = doc.enclosing(input, CONTAINER).await else {
        return false;
    };
    match doc.describe(container).await {
        Ok(Some(snapshot)) => field.matches_keyword(&snapshot.normalized_text()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::dom::MemoryDocument;

    fn identifier() -> FieldSpec {
        Config::default().fields.identifier.with_value("SKU-1")
    }

    #[tokio::test]
    async fn test_picks_empty_input_with_expected_length_near_keyword() {
        let doc = MemoryDocument::new(
            r#"
            <div><em>Search</em><input id="search" type="text" maxlength="50"></div>
            <div><em>SKU</em><input id="filled" type="text" maxlength="50" value="ABC"></div>
            <div><em>SKU</em><input id="wrong-len" type="text" maxlength="20"></div>
            <div><em>SKU</em><input id="target" type="text" maxlength="50"></div>
            "#,
        );
        assert_eq!(scan_inputs(&doc, &identifier()).await, doc.handle_for("#target"));
    }

    #[tokio::test]
    async fn test_no_length_hint_accepts_any_length() {
        let doc = MemoryDocument::new(
            r#"
            <div><em>Asking price</em><input id="p" type="number"></div>
            "#,
        );
        let price = Config::default().fields.price.with_value("16.32");
        assert_eq!(scan_inputs(&doc, &price).await, doc.handle_for("#p"));
    }

    #[tokio::test]
    async fn test_hidden_inputs_and_wrong_kind_are_skipped() {
        let doc = MemoryDocument::new(
            r#"
            <div><em>SKU</em><input type="text" maxlength="50" hidden></div>
            <div><em>SKU</em><input type="checkbox" maxlength="50"></div>
            "#,
        );
        assert_eq!(scan_inputs(&doc, &identifier()).await, None);
    }
}
