use crate::errors::Result;
use crate::types::{ElementSnapshot, NodeHandle, SyntheticEvent, ValueTracking};
use async_trait::async_trait;

/// Read-only access to the page's DOM.
///
/// Implementations must re-read the document on every call: the page keeps
/// rendering between calls and nothing returned here is cached.
#[async_trait]
pub trait DocumentQuery: Send + Sync {
    /// First element matching `selector` in document order.
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>>;

    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>>;

    /// Descendants of `scope` matching `selector`. The scope itself is excluded.
    async fn query_within(&self, scope: NodeHandle, selector: &str) -> Result<Vec<NodeHandle>>;

    /// Fresh snapshot of `node`, or `None` if it is no longer attached.
    async fn describe(&self, node: NodeHandle) -> Result<Option<ElementSnapshot>>;

    /// Up to `limit` following element siblings of `node`.
    async fn next_siblings(&self, node: NodeHandle, limit: usize) -> Result<Vec<NodeHandle>>;

    /// Nearest ancestor of `node` (never `node` itself) matching `selector`.
    async fn enclosing(&self, node: NodeHandle, selector: &str) -> Result<Option<NodeHandle>>;
}

/// Value writes and event dispatch on a resolved input.
///
/// The tracking check and the two setters are separate so the committer can
/// be exercised against both framework-tracked and plain inputs.
#[async_trait]
pub trait ElementWriter: Send + Sync {
    /// Current DOM value, `None` if the element is gone.
    async fn read_value(&self, node: NodeHandle) -> Result<Option<String>>;

    /// Whether the page's framework keeps a shadow value for this input.
    async fn value_tracking(&self, node: NodeHandle) -> Result<ValueTracking>;

    /// Write through the element prototype's native setter, bypassing any
    /// framework interception.
    async fn set_value_native(&self, node: NodeHandle, value: &str) -> Result<()>;

    /// Overwrite the framework's shadow copy of the value.
    async fn set_tracked_value(&self, node: NodeHandle, value: &str) -> Result<()>;

    /// Plain `element.value = value` assignment.
    async fn assign_value(&self, node: NodeHandle, value: &str) -> Result<()>;

    /// Dispatch a bubbling synthetic event on `node`.
    async fn dispatch(&self, node: NodeHandle, event: SyntheticEvent) -> Result<()>;
}

/// Everything the engine needs from a page.
pub trait Page: DocumentQuery + ElementWriter {}

impl<T: DocumentQuery + ElementWriter> Page for T {}
