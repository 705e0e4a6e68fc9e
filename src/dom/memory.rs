use crate::core::{DocumentQuery, ElementWriter};
use crate::errors::{AutofillError, Result};
use crate::types::{ElementRect, ElementSnapshot, NodeHandle, SyntheticEvent, ValueTracking};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const CONTROLLED_ATTR: &str = "data-controlled";
const FROZEN_ATTR: &str = "data-frozen";

#[derive(Debug, Default, Clone)]
struct NodeState {
    value: Option<String>,
    tracker: Option<String>,
    framework_value: Option<String>,
    rendered: Option<bool>,
    disabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub node: NodeHandle,
    pub event: SyntheticEvent,
}

/// In-memory page for tests and offline dry runs.
///
/// The markup is re-parsed on every call, so a [`MemoryDocument::replace_html`]
/// re-render invalidates handles the way it would on a live page. Values and
/// layout or disabled overrides live beside the markup.
///
/// Inputs carrying `data-controlled` act like a reactive framework with a
/// shadow value tracker: an `input`/`change` event whose DOM value equals the
/// tracked value is "no change", and the framework re-renders its own value
/// over the DOM. Inputs carrying `data-frozen` revert every write on the next
/// `input`/`change` event.
pub struct MemoryDocument {
    html: RwLock<String>,
    nodes: Mutex<HashMap<u64, NodeState>>,
    events: Mutex<Vec<DispatchedEvent>>,
    dom_reads: AtomicUsize,
}

/// One parse of the markup. Handles are positions in document order.
struct ParsedPage<'a> {
    elements: Vec<ElementRef<'a>>,
    positions: HashMap<usize, usize>,
}

/// Identity of an element within a single parse.
fn node_key(element: &ElementRef<'_>) -> usize {
    element.value() as *const _ as usize
}

impl<'a> ParsedPage<'a> {
    fn new(html: &'a Html) -> Self {
        let elements: Vec<ElementRef<'a>> = html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();
        let positions = elements
            .iter()
            .enumerate()
            .map(|(index, element)| (node_key(element), index))
            .collect();
        Self {
            elements,
            positions,
        }
    }

    fn get(&self, handle: NodeHandle) -> Option<ElementRef<'a>> {
        usize::try_from(handle.0)
            .ok()
            .and_then(|index| self.elements.get(index).copied())
    }

    fn handle_of(&self, element: &ElementRef<'a>) -> Option<NodeHandle> {
        self.positions
            .get(&node_key(element))
            .map(|&index| NodeHandle(index as u64))
    }
}

impl MemoryDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: RwLock::new(html.into()),
            nodes: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            dom_reads: AtomicUsize::new(0),
        }
    }

    /// Simulate a full re-render: new markup, all per-node state dropped.
    pub fn replace_html(&self, html: impl Into<String>) {
        *self.html.write() = html.into();
        self.nodes.lock().clear();
    }

    /// Number of `DocumentQuery` calls issued so far.
    pub fn query_count(&self) -> usize {
        self.dom_reads.load(Ordering::SeqCst)
    }

    /// Force every element matching `selector` to have (or lose) a layout box.
    pub fn set_rendered(&self, selector: &str, rendered: bool) -> Result<usize> {
        let handles = self.select_handles(selector)?;
        let mut nodes = self.nodes.lock();
        for handle in &handles {
            nodes.entry(handle.0).or_default().rendered = Some(rendered);
        }
        Ok(handles.len())
    }

    pub fn set_disabled(&self, selector: &str, disabled: bool) -> Result<usize> {
        let handles = self.select_handles(selector)?;
        let mut nodes = self.nodes.lock();
        for handle in &handles {
            nodes.entry(handle.0).or_default().disabled = Some(disabled);
        }
        Ok(handles.len())
    }

    /// Handle of the first match, without counting as a page query.
    pub fn handle_for(&self, selector: &str) -> Option<NodeHandle> {
        self.select_handles(selector)
            .ok()
            .and_then(|handles| handles.into_iter().next())
    }

    /// Current value of the first match, without counting as a page query.
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let handle = self.handle_for(selector)?;
        self.current_value(handle)
    }

    pub fn events_for(&self, node: NodeHandle) -> Vec<SyntheticEvent> {
        self.events
            .lock()
            .iter()
            .filter(|dispatched| dispatched.node == node)
            .map(|dispatched| dispatched.event)
            .collect()
    }

    pub fn dispatched_events(&self) -> Vec<DispatchedEvent> {
        self.events.lock().clone()
    }

    fn with_page<R>(&self, f: impl FnOnce(&ParsedPage<'_>) -> R) -> R {
        let html = Html::parse_document(&self.html.read());
        let page = ParsedPage::new(&html);
        f(&page)
    }

    fn count_read(&self) {
        self.dom_reads.fetch_add(1, Ordering::SeqCst);
    }

    fn select_handles(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        let parsed = parse_selector(selector)?;
        Ok(self.with_page(|page| {
            page.elements
                .iter()
                .filter(|element| parsed.matches(element))
                .filter_map(|element| page.handle_of(element))
                .collect()
        }))
    }

    fn markup_flags(&self, node: NodeHandle) -> Option<MarkupFlags> {
        self.with_page(|page| page.get(node).map(|element| MarkupFlags::of(&element)))
    }

    fn current_value(&self, node: NodeHandle) -> Option<String> {
        let flags = self.markup_flags(node)?;
        let state = self.nodes.lock().get(&node.0).cloned().unwrap_or_default();
        Some(state.value.unwrap_or(flags.initial_value))
    }

    fn require_flags(&self, node: NodeHandle) -> Result<MarkupFlags> {
        self.markup_flags(node)
            .ok_or(AutofillError::StaleElement(node.0))
    }

    fn simulate_framework(&self, node: NodeHandle, flags: &MarkupFlags, event: SyntheticEvent) {
        if !matches!(event, SyntheticEvent::Input | SyntheticEvent::Change) {
            return;
        }
        let mut nodes = self.nodes.lock();
        let state = nodes.entry(node.0).or_default();
        let dom_value = state
            .value
            .clone()
            .unwrap_or_else(|| flags.initial_value.clone());
        let framework_value = state
            .framework_value
            .clone()
            .unwrap_or_else(|| flags.initial_value.clone());

        if flags.frozen {
            state.value = Some(framework_value);
            return;
        }
        if !flags.controlled {
            return;
        }

        let tracked = state
            .tracker
            .clone()
            .unwrap_or_else(|| flags.initial_value.clone());
        if tracked != dom_value {
            state.framework_value = Some(dom_value.clone());
            state.tracker = Some(dom_value);
        } else {
            state.value = Some(framework_value);
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AutofillError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

/// Facts derived from markup alone.
#[derive(Debug, Clone)]
struct MarkupFlags {
    initial_value: String,
    controlled: bool,
    frozen: bool,
}

impl MarkupFlags {
    fn of(element: &ElementRef<'_>) -> Self {
        let value = element.value();
        let initial_value = if value.name() == "textarea" {
            element.text().collect()
        } else {
            value.attr("value").unwrap_or_default().to_string()
        };
        Self {
            initial_value,
            controlled: value.attr(CONTROLLED_ATTR).is_some(),
            frozen: value.attr(FROZEN_ATTR).is_some(),
        }
    }
}

fn is_form_control(tag_name: &str) -> bool {
    matches!(tag_name, "input" | "textarea" | "select" | "button")
}

/// Markup that keeps an element out of layout.
fn hides_itself(element: &ElementRef<'_>) -> bool {
    let value = element.value();

    if matches!(
        value.name(),
        "head" | "script" | "style" | "template" | "title" | "meta" | "noscript"
    ) {
        return true;
    }

    if value.attr("hidden").is_some() {
        return true;
    }

    if let Some(style) = value.attr("style") {
        let style = style.to_lowercase().replace(' ', "");
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }

    if let Some(class) = value.attr("class") {
        if class
            .split_whitespace()
            .any(|c| matches!(c, "hidden" | "d-none" | "invisible"))
        {
            return true;
        }
    }

    false
}

fn markup_rendered(element: &ElementRef<'_>) -> bool {
    if element.value().name() == "input"
        && element.value().attr("type").map(str::to_lowercase).as_deref() == Some("hidden")
    {
        return false;
    }
    if hides_itself(element) {
        return false;
    }
    !element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| hides_itself(&ancestor))
}

fn markup_disabled(element: &ElementRef<'_>) -> bool {
    if !is_form_control(element.value().name()) {
        return false;
    }
    element.value().attr("disabled").is_some()
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| {
                ancestor.value().name() == "fieldset" && ancestor.value().attr("disabled").is_some()
            })
}

#[async_trait]
impl DocumentQuery for MemoryDocument {
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>> {
        self.count_read();
        Ok(self.select_handles(selector)?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        self.count_read();
        self.select_handles(selector)
    }

    async fn query_within(&self, scope: NodeHandle, selector: &str) -> Result<Vec<NodeHandle>> {
        self.count_read();
        let parsed = parse_selector(selector)?;
        self.with_page(|page| -> Result<Vec<NodeHandle>> {
            let scope_ref = page
                .get(scope)
                .ok_or(AutofillError::StaleElement(scope.0))?;
            Ok(scope_ref
                .select(&parsed)
                .filter(|element| element.id() != scope_ref.id())
                .filter_map(|element| page.handle_of(&element))
                .collect())
        })
    }

    async fn describe(&self, node: NodeHandle) -> Result<Option<ElementSnapshot>> {
        self.count_read();
        let state = self.nodes.lock().get(&node.0).cloned().unwrap_or_default();
        Ok(self.with_page(|page| {
            let element = page.get(node)?;
            let value = element.value();
            let flags = MarkupFlags::of(&element);
            let rendered = state.rendered.unwrap_or_else(|| markup_rendered(&element));
            let disabled = state.disabled.unwrap_or_else(|| markup_disabled(&element));
            let current_value = if matches!(value.name(), "input" | "textarea" | "select") {
                Some(state.value.clone().unwrap_or(flags.initial_value))
            } else {
                None
            };

            Some(ElementSnapshot {
                tag_name: value.name().to_string(),
                attributes: value
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text_content: element.text().collect(),
                value: current_value,
                rect: rendered.then(|| ElementRect {
                    x: 0.0,
                    y: node.0 as f64 * 24.0,
                    width: 240.0,
                    height: 24.0,
                }),
                disabled,
            })
        }))
    }

    async fn next_siblings(&self, node: NodeHandle, limit: usize) -> Result<Vec<NodeHandle>> {
        self.count_read();
        self.with_page(|page| -> Result<Vec<NodeHandle>> {
            let element = page.get(node).ok_or(AutofillError::StaleElement(node.0))?;
            Ok(element
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .take(limit)
                .filter_map(|sibling| page.handle_of(&sibling))
                .collect())
        })
    }

    async fn enclosing(&self, node: NodeHandle, selector: &str) -> Result<Option<NodeHandle>> {
        self.count_read();
        let parsed = parse_selector(selector)?;
        self.with_page(|page| -> Result<Option<NodeHandle>> {
            let element = page.get(node).ok_or(AutofillError::StaleElement(node.0))?;
            Ok(element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|ancestor| parsed.matches(ancestor))
                .and_then(|ancestor| page.handle_of(&ancestor)))
        })
    }
}

#[async_trait]
impl ElementWriter for MemoryDocument {
    async fn read_value(&self, node: NodeHandle) -> Result<Option<String>> {
        Ok(self.current_value(node))
    }

    async fn value_tracking(&self, node: NodeHandle) -> Result<ValueTracking> {
        let flags = self.require_flags(node)?;
        Ok(if flags.controlled {
            ValueTracking::Shadowed
        } else {
            ValueTracking::Plain
        })
    }

    async fn set_value_native(&self, node: NodeHandle, value: &str) -> Result<()> {
        self.require_flags(node)?;
        self.nodes.lock().entry(node.0).or_default().value = Some(value.to_string());
        Ok(())
    }

    async fn set_tracked_value(&self, node: NodeHandle, value: &str) -> Result<()> {
        let flags = self.require_flags(node)?;
        if flags.controlled {
            self.nodes.lock().entry(node.0).or_default().tracker = Some(value.to_string());
        }
        Ok(())
    }

    async fn assign_value(&self, node: NodeHandle, value: &str) -> Result<()> {
        let flags = self.require_flags(node)?;
        let mut nodes = self.nodes.lock();
        let state = nodes.entry(node.0).or_default();
        state.value = Some(value.to_string());
        if flags.controlled {
            // the framework's intercepted setter keeps its shadow copy in sync
            state.tracker = Some(value.to_string());
        }
        Ok(())
    }

    async fn dispatch(&self, node: NodeHandle, event: SyntheticEvent) -> Result<()> {
        let flags = self.require_flags(node)?;
        self.events.lock().push(DispatchedEvent { node, event });
        self.simulate_framework(node, &flags, event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <form id="listing">
            <label for="sku">SKU</label>
            <input id="sku" name="sku" type="text" value="old">
            <input id="ghost" type="text" style="display: none">
            <div hidden><input id="nested-hidden" type="text"></div>
            <fieldset disabled><input id="locked" type="text"></fieldset>
            <input id="price" type="number" data-controlled value="1.00">
          </form>
          <div style="visibility: hidden"><input id="invisible" type="text"></div>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_query_counts_and_document_order() {
        let doc = MemoryDocument::new(PAGE);
        let inputs = doc.query_all("input").await.unwrap();
        assert_eq!(inputs.len(), 6);
        assert_eq!(doc.query("input").await.unwrap(), Some(inputs[0]));
        assert_eq!(doc.query_count(), 2);

        // test helpers do not count as page queries
        doc.handle_for("#sku");
        assert_eq!(doc.query_count(), 2);
    }

    async fn snapshot(doc: &MemoryDocument, selector: &str) -> ElementSnapshot {
        let handle = doc.handle_for(selector).unwrap();
        doc.describe(handle).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_layout_and_disabled_from_markup() {
        let doc = MemoryDocument::new(PAGE);

        assert!(snapshot(&doc, "#sku").await.rect.is_some());
        assert!(snapshot(&doc, "#ghost").await.rect.is_none());
        assert!(snapshot(&doc, "#nested-hidden").await.rect.is_none());
        assert!(snapshot(&doc, "#locked").await.disabled);
        assert!(!snapshot(&doc, "#sku").await.disabled);
        assert_eq!(snapshot(&doc, "label").await.text_content, "SKU");
        assert_eq!(snapshot(&doc, "#sku").await.value.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_invalid_selector_is_an_error() {
        let doc = MemoryDocument::new(PAGE);
        let result = doc.query("input[[").await;
        assert!(matches!(result, Err(AutofillError::InvalidSelector(_))));
    }

    #[tokio::test]
    async fn test_relationship_queries() {
        let doc = MemoryDocument::new(PAGE);
        let label = doc.handle_for("label").unwrap();
        let siblings = doc.next_siblings(label, 2).await.unwrap();
        assert_eq!(siblings, vec![
            doc.handle_for("#sku").unwrap(),
            doc.handle_for("#ghost").unwrap()
        ]);

        let form = doc.enclosing(label, "form").await.unwrap();
        assert_eq!(form, doc.handle_for("form"));
        assert_eq!(doc.enclosing(form.unwrap(), "form").await.unwrap(), None);

        let inside = doc.query_within(form.unwrap(), "input").await.unwrap();
        assert_eq!(inside.len(), 5);
    }

    #[tokio::test]
    async fn test_rerender_invalidates_handles() {
        let doc = MemoryDocument::new(PAGE);
        let price = doc.handle_for("#price").unwrap();
        doc.replace_html("<html><body><p>gone</p></body></html>");
        assert!(doc.describe(price).await.unwrap().is_none());
        assert!(matches!(
            doc.assign_value(price, "1").await,
            Err(AutofillError::StaleElement(_))
        ));
    }

    #[tokio::test]
    async fn test_controlled_input_reverts_plain_assignment() {
        let doc = MemoryDocument::new(PAGE);
        let price = doc.handle_for("#price").unwrap();

        doc.assign_value(price, "9.99").await.unwrap();
        doc.dispatch(price, SyntheticEvent::Input).await.unwrap();
        assert_eq!(doc.read_value(price).await.unwrap().as_deref(), Some("1.00"));

        doc.set_value_native(price, "9.99").await.unwrap();
        doc.set_tracked_value(price, "1.00").await.unwrap();
        doc.dispatch(price, SyntheticEvent::Input).await.unwrap();
        doc.dispatch(price, SyntheticEvent::Change).await.unwrap();
        assert_eq!(doc.read_value(price).await.unwrap().as_deref(), Some("9.99"));
    }

    #[tokio::test]
    async fn test_plain_input_keeps_assignment() {
        let doc = MemoryDocument::new(PAGE);
        let sku = doc.handle_for("#sku").unwrap();
        assert_eq!(doc.value_tracking(sku).await.unwrap(), ValueTracking::Plain);
        doc.assign_value(sku, "SKU-42").await.unwrap();
        doc.dispatch(sku, SyntheticEvent::Input).await.unwrap();
        assert_eq!(doc.value_of("#sku").as_deref(), Some("SKU-42"));
        assert_eq!(doc.events_for(sku), vec![SyntheticEvent::Input]);
    }

    #[tokio::test]
    async fn test_visibility_hidden_has_no_layout_box() {
        let doc = MemoryDocument::new(PAGE);
        assert!(snapshot(&doc, "#invisible").await.rect.is_none());

        let tagged = MemoryDocument::new(r#"<p class="lead invisible"><input id="x"></p>"#);
        assert!(snapshot(&tagged, "#x").await.rect.is_none());
    }

    #[tokio::test]
    async fn test_large_document_handles_follow_document_order() {
        let rows: String = (0..3000)
            .map(|i| format!(r#"<div class="row"><span id="s{0}">{0}</span></div>"#, i))
            .collect();
        let doc = MemoryDocument::new(format!("<html><body>{}</body></html>", rows));

        let spans = doc.query_all("span").await.unwrap();
        assert_eq!(spans.len(), 3000);
        assert!(spans.windows(2).all(|pair| pair[0].0 < pair[1].0));

        let last = doc.describe(spans[2999]).await.unwrap().unwrap();
        assert_eq!(last.element_id(), Some("s2999"));

        let row = doc.enclosing(spans[1500], "div.row").await.unwrap().unwrap();
        assert_eq!(row.0 + 1, spans[1500].0);
        assert_eq!(doc.query_within(row, "span").await.unwrap(), vec![spans[1500]]);
    }
}
