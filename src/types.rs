use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque reference to an element in a live or synthetic document.
///
/// Handles are only meaningful for the document that issued them and may go
/// stale at any time when the page re-renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Point-in-time view of an element, read fresh on every poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub tag_name: String,
    pub attributes: HashMap<String, String>,
    pub text_content: String,
    pub value: Option<String>,
    /// `None` when the element has no layout box (not rendered).
    pub rect: Option<ElementRect>,
    pub disabled: bool,
}

impl ElementSnapshot {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn element_id(&self) -> Option<&str> {
        self.attribute("id").filter(|id| !id.is_empty())
    }

    pub fn max_length(&self) -> Option<u32> {
        self.attribute("maxlength")
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn is_empty_value(&self) -> bool {
        self.value
            .as_deref()
            .map(|v| v.trim().is_empty())
            .unwrap_or(true)
    }

    /// Text with runs of whitespace collapsed, as a reader would see it.
    pub fn normalized_text(&self) -> String {
        self.text_content
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Events the committer dispatches, in the order it dispatches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticEvent {
    Input,
    Change,
    Blur,
}

impl SyntheticEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntheticEvent::Input => "input",
            SyntheticEvent::Change => "change",
            SyntheticEvent::Blur => "blur",
        }
    }
}

/// How the page's UI framework tracks an input's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTracking {
    /// The framework keeps a shadow copy of the last known value and only
    /// reacts when the DOM value differs from it.
    Shadowed,
    /// Plain input, DOM value is the source of truth.
    Plain,
}
