use crate::autofill::field::FieldSpec;
use crate::autofill::visibility::{interactable_snapshot, is_interactable};
use crate::core::DocumentQuery;
use crate::types::NodeHandle;

pub const LABEL_LIKE: &str = "label, legend, h1, h2, h3, h4, h5, h6, dt, th, span, p, strong, div";
pub const CONTAINER: &str = "div, section, fieldset, form, li, td";
const FORM_CONTROLS: &str = "input, textarea, select";

#[derive(Debug, Clone, Copy)]
pub struct TextualOptions {
    pub sibling_walk_limit: usize,
    pub max_label_text_len: usize,
}

/// Find text naming the field, then walk from it to the input it labels.
///
/// Per matching label, first hit wins: the `for` association by id, then up
/// to `sibling_walk_limit` following siblings (the sibling itself or the
/// first value input inside it), then the nearest enclosing block, where an
/// input following the site's `maxlength` convention beats the first one.
pub async fn locate_by_text<D: DocumentQuery + ?Sized>(
    doc: &D,
    field: &FieldSpec,
    options: TextualOptions,
) -> Option<NodeHandle> {
    if field.fallback_keywords.is_empty() {
        return None;
    }

    let candidates = match doc.query_all(LABEL_LIKE).await {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::debug!(field = %field.field_id, error = %err, "label scan failed");
            return None;
        }
    };

    for label in candidates {
        if !is_label_for(doc, label, field, options).await {
            continue;
        }
        if let Some(found) = follow_label(doc, label, field, options).await {
            return Some(found);
        }
    }

    None
}

/// Rendered, short, mentions a keyword, and is not itself a wrapper around
/// form controls (a `<label>` wrapping its input is still a label).
async fn is_label_for<D: DocumentQuery + ?Sized>(
    doc: &D,
    node: NodeHandle,
    field: &FieldSpec,
    options: TextualOptions,
) -> bool {
    let Ok(Some(snapshot)) = doc.describe(node).await else {
        return false;
    };
    if snapshot.rect.is_none() {
        return false;
    }
    let text = snapshot.normalized_text();
    if text.is_empty() || text.len() > options.max_label_text_len || !field.matches_keyword(&text) {
        return false;
    }
    if snapshot.tag_name != "label" {
        let wraps_controls = doc
            .query_within(node, FORM_CONTROLS)
            .await
            .map(|controls| !controls.is_empty())
            .unwrap_or(true);
        if wraps_controls {
            return false;
        }
    }
    true
}

async fn follow_label<D: DocumentQuery + ?Sized>(
    doc: &D,
    label: NodeHandle,
    field: &FieldSpec,
    options: TextualOptions,
) -> Option<NodeHandle> {
    if let Some(found) = by_for_attribute(doc, label).await {
        return Some(found);
    }
    if let Some(found) = by_following_siblings(doc, label, field, options.sibling_walk_limit).await {
        return Some(found);
    }
    by_enclosing_container(doc, label, field).await
}

async fn by_for_attribute<D: DocumentQuery + ?Sized>(doc: &D, label: NodeHandle) -> Option<NodeHandle> {
    let snapshot = doc.describe(label).await.ok().flatten()?;
    let target_id = snapshot.attribute("for").filter(|id| !id.is_empty())?;
    let target = doc.query(&id_selector(target_id)).await.ok().flatten()?;
    is_interactable(doc, Some(target)).await.then_some(target)
}

async fn by_following_siblings<D: DocumentQuery + ?Sized>(
    doc: &D,
    label: NodeHandle,
    field: &FieldSpec,
    limit: usize,
) -> Option<NodeHandle> {
    let siblings = doc.next_siblings(label, limit).await.ok()?;
    for sibling in siblings {
        if let Some(snapshot) = interactable_snapshot(doc, sibling).await {
            if field.input_kind.accepts(&snapshot) {
                return Some(sibling);
            }
        }
        if let Some(found) = first_interactable_within(doc, sibling, field).await {
            return Some(found);
        }
    }
    None
}

async fn by_enclosing_container<D: DocumentQuery + ?Sized>(
    doc: &D,
    label: NodeHandle,
    field: &FieldSpec,
) -> Option<NodeHandle> {
    let container = doc.enclosing(label, CONTAINER).await.ok().flatten()?;
    let inputs = doc
        .query_within(container, field.input_kind.selector())
        .await
        .ok()?;

    let mut first_interactable = None;
    for input in inputs {
        let Some(snapshot) = interactable_snapshot(doc, input).await else {
            continue;
        };
        if field.max_length.is_some() && snapshot.max_length() == field.max_length {
            return Some(input);
        }
        first_interactable.get_or_insert(input);
    }
    first_interactable
}

async fn first_interactable_within<D: DocumentQuery + ?Sized>(
    doc: &D,
    scope: NodeHandle,
    field: &FieldSpec,
) -> Option<NodeHandle> {
    let inputs = doc
        .query_within(scope, field.input_kind.selector())
        .await
        .ok()?;
    for input in inputs {
        if is_interactable(doc, Some(input)).await {
            return Some(input);
        }
    }
    None
}

/// Attribute form so ids that are not valid CSS identifiers still work.
pub fn id_selector(id: &str) -> String {
    format!(
        r#"[id="{}"]"#,
        id.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::dom::MemoryDocument;

    fn options() -> TextualOptions {
        TextualOptions {
            sibling_walk_limit: 3,
            max_label_text_len: 80,
        }
    }

    fn identifier() -> FieldSpec {
        Config::default().fields.identifier.with_value("SKU-1")
    }

    #[tokio::test]
    async fn test_for_attribute_association() {
        let doc = MemoryDocument::new(
            r#"
            <label for="f-22">Item identifier</label>
            <input id="f-21" type="text">
            <input id="f-22" type="text">
            "#,
        );
        let found = locate_by_text(&doc, &identifier(), options()).await;
        assert_eq!(found, doc.handle_for("#f-22"));
    }

    #[tokio::test]
    async fn test_disabled_for_target_falls_through_to_sibling() {
        let doc = MemoryDocument::new(
            r#"
            <label for="locked">SKU</label>
            <input id="locked" type="text" disabled>
            <em>optional</em>
            <input id="next" type="text">
            "#,
        );
        let found = locate_by_text(&doc, &identifier(), options()).await;
        assert_eq!(found, doc.handle_for("#next"));
    }

    #[tokio::test]
    async fn test_sibling_walk_is_bounded() {
        let doc = MemoryDocument::new(
            r#"
            <section>
              <span>SKU</span><br><br><br><br>
              <input id="far" type="text" maxlength="10">
            </section>
            "#,
        );
        let options = TextualOptions {
            sibling_walk_limit: 3,
            max_label_text_len: 80,
        };
        // too far for the sibling walk, but the enclosing section still has it
        let found = locate_by_text(&doc, &identifier(), options).await;
        assert_eq!(found, doc.handle_for("#far"));
    }

    #[tokio::test]
    async fn test_container_prefers_max_length_convention() {
        let doc = MemoryDocument::new(
            r#"
            <div class="field">
              <div class="caption"><span>Product ID</span></div>
              <div class="control">
                <input id="search" type="text" maxlength="200">
                <input id="sku" type="text" maxlength="50">
              </div>
            </div>
            "#,
        );
        let options = TextualOptions {
            sibling_walk_limit: 0,
            max_label_text_len: 80,
        };
        let found = locate_by_text(&doc, &identifier(), options).await;
        assert_eq!(found, doc.handle_for("#sku"));
    }

    #[tokio::test]
    async fn test_hidden_and_long_labels_are_ignored() {
        let doc = MemoryDocument::new(
            r#"
            <label for="a" hidden>SKU</label>
            <input id="a" type="text">
            <p>This paragraph mentions the sku somewhere inside a long explanation that keeps going far past any label length</p>
            <input id="b" type="text">
            "#,
        );
        assert_eq!(locate_by_text(&doc, &identifier(), options()).await, None);
    }

    #[test]
    fn test_id_selector_escapes_quotes() {
        assert_eq!(id_selector(r#"a"b"#), r#"[id="a\"b"]"#);
    }
}
