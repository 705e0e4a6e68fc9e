use crate::core::BrowserTrait;
use crate::errors::{AutofillError, Result};
use crate::types::{NodeHandle, SyntheticEvent};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Shared preamble for every page script.
///
/// Elements are registered in a page-global map of `WeakRef`s so a handle
/// never keeps a removed node alive, and a handle to a node that left the
/// document resolves to `null`.
const REGISTRY_PRELUDE: &str = r#"
    const __af = window.__autofillRefs || (window.__autofillRefs = { seq: 0, byId: new Map(), byEl: new WeakMap() });
    const __tag = (el) => {
        let id = __af.byEl.get(el);
        if (id === undefined) {
            id = ++__af.seq;
            __af.byEl.set(el, id);
            __af.byId.set(id, new WeakRef(el));
        }
        return id;
    };
    const __find = (id) => {
        const ref = __af.byId.get(id);
        const el = ref ? ref.deref() : undefined;
        if (!el || !el.isConnected) {
            __af.byId.delete(id);
            return null;
        }
        return el;
    };
    const __require = (id) => {
        const el = __find(id);
        if (!el) {
            const err = new Error('stale element ' + id);
            err.kind = 'stale';
            throw err;
        }
        return el;
    };
"#;

#[derive(Debug, Deserialize)]
struct ScriptReply<T> {
    ok: bool,
    data: Option<T>,
    kind: Option<String>,
    message: Option<String>,
}

pub struct JavaScriptRunner;

impl JavaScriptRunner {
    pub async fn execute_with_timeout<B: BrowserTrait>(
        browser: &B,
        tab: &B::TabHandle,
        script: &str,
        timeout: Duration,
    ) -> Result<Value> {
        let execution = browser.execute_script(tab, script);

        tokio::time::timeout(timeout, execution)
            .await
            .map_err(|_| AutofillError::JavaScriptTimeout)?
    }

    /// Run a script built by [`wrap_body`] and decode its JSON reply.
    pub async fn evaluate<B: BrowserTrait, T: DeserializeOwned>(
        browser: &B,
        tab: &B::TabHandle,
        script: &str,
        timeout: Duration,
    ) -> Result<Option<T>> {
        let raw = Self::execute_with_timeout(browser, tab, script, timeout).await?;
        let text = raw.as_str().ok_or_else(|| {
            AutofillError::JavaScriptFailed(format!("expected a JSON string reply, got {}", raw))
        })?;
        decode_reply(text)
    }
}

fn decode_reply<T: DeserializeOwned>(text: &str) -> Result<Option<T>> {
    let reply: ScriptReply<T> = serde_json::from_str(text)?;
    if reply.ok {
        return Ok(reply.data);
    }

    let message = reply.message.unwrap_or_else(|| "unknown error".to_string());
    Err(match reply.kind.as_deref() {
        Some("invalid_selector") => AutofillError::InvalidSelector(message),
        Some("stale") => {
            let id = message
                .rsplit(' ')
                .next()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default();
            AutofillError::StaleElement(id)
        }
        _ => AutofillError::JavaScriptFailed(message),
    })
}

/// Wrap a function body so it always evaluates to a JSON string of the form
/// `{ ok, data }` or `{ ok: false, kind, message }`.
pub fn wrap_body(body: &str) -> String {
    format!(
        r#"(function() {{
    {prelude}
    try {{
        const data = (function() {{ {body} }})();
        return JSON.stringify({{ ok: true, data: data === undefined ? null : data }});
    }} catch (e) {{
        const kind = e.kind || (e.name === 'SyntaxError' ? 'invalid_selector' : 'script');
        return JSON.stringify({{ ok: false, kind: kind, message: String(e.message || e) }});
    }}
}})()"#,
        prelude = REGISTRY_PRELUDE,
        body = body
    )
}

/// JSON-encode a string so it can be spliced into a script as a literal.
fn literal(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn query(selector: &str) -> String {
    wrap_body(&format!(
        "const el = document.querySelector({}); return el ? __tag(el) : null;",
        literal(selector)
    ))
}

pub fn query_all(selector: &str) -> String {
    wrap_body(&format!(
        "return Array.from(document.querySelectorAll({})).map(__tag);",
        literal(selector)
    ))
}

pub fn query_within(scope: NodeHandle, selector: &str) -> String {
    wrap_body(&format!(
        "const scope = __require({}); return Array.from(scope.querySelectorAll({})).map(__tag);",
        scope.0,
        literal(selector)
    ))
}

pub fn describe(node: NodeHandle) -> String {
    wrap_body(&format!(
        r#"
        const el = __find({id});
        if (!el) return null;
        const attributes = {{}};
        for (const attr of el.attributes) attributes[attr.name] = attr.value;
        // visibility:hidden keeps a box but takes no input, so it counts as unrendered
        const hasBox = el.getClientRects().length > 0 && getComputedStyle(el).visibility !== 'hidden';
        const rect = el.getBoundingClientRect();
        return {{
            tag_name: el.tagName.toLowerCase(),
            attributes: attributes,
            text_content: el.textContent || '',
            value: typeof el.value === 'string' ? el.value : null,
            rect: hasBox ? {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }} : null,
            disabled: !!el.disabled || (typeof el.matches === 'function' && el.matches(':disabled')),
        }};
        "#,
        id = node.0
    ))
}

pub fn next_siblings(node: NodeHandle, limit: usize) -> String {
    wrap_body(&format!(
        r#"
        const out = [];
        let cursor = __require({id}).nextElementSibling;
        while (cursor && out.length < {limit}) {{
            out.push(__tag(cursor));
            cursor = cursor.nextElementSibling;
        }}
        return out;
        "#,
        id = node.0,
        limit = limit
    ))
}

pub fn enclosing(node: NodeHandle, selector: &str) -> String {
    wrap_body(&format!(
        r#"
        const parent = __require({id}).parentElement;
        const found = parent ? parent.closest({selector}) : null;
        return found ? __tag(found) : null;
        "#,
        id = node.0,
        selector = literal(selector)
    ))
}

pub fn read_value(node: NodeHandle) -> String {
    wrap_body(&format!(
        "const el = __find({}); return el && typeof el.value === 'string' ? el.value : null;",
        node.0
    ))
}

pub fn value_tracking(node: NodeHandle) -> String {
    wrap_body(&format!(
        "const el = __require({}); return el._valueTracker ? 'shadowed' : 'plain';",
        node.0
    ))
}

pub fn set_value_native(node: NodeHandle, value: &str) -> String {
    wrap_body(&format!(
        r#"
        const el = __require({id});
        const proto = el instanceof HTMLTextAreaElement
            ? HTMLTextAreaElement.prototype
            : el instanceof HTMLSelectElement
                ? HTMLSelectElement.prototype
                : HTMLInputElement.prototype;
        Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {value});
        return true;
        "#,
        id = node.0,
        value = literal(value)
    ))
}

pub fn set_tracked_value(node: NodeHandle, value: &str) -> String {
    wrap_body(&format!(
        r#"
        const el = __require({id});
        if (el._valueTracker) el._valueTracker.setValue({value});
        return true;
        "#,
        id = node.0,
        value = literal(value)
    ))
}

pub fn assign_value(node: NodeHandle, value: &str) -> String {
    wrap_body(&format!(
        "const el = __require({}); el.value = {}; return true;",
        node.0,
        literal(value)
    ))
}

pub fn dispatch(node: NodeHandle, event: SyntheticEvent) -> String {
    let constructor = match event {
        SyntheticEvent::Blur => "FocusEvent",
        SyntheticEvent::Input | SyntheticEvent::Change => "Event",
    };
    wrap_body(&format!(
        r#"
        const el = __require({id});
        el.dispatchEvent(new {constructor}({name}, {{ bubbles: true, cancelable: true }}));
        return true;
        "#,
        id = node.0,
        constructor = constructor,
        name = literal(event.as_str())
    ))
}
