use crate::core::{BrowserTrait, DocumentQuery, ElementWriter};
use crate::errors::{AutofillError, Result};
use crate::types::{ElementSnapshot, NodeHandle, SyntheticEvent, ValueTracking};
use crate::utils::javascript::{self, JavaScriptRunner};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// A live browser tab exposed through the engine's page capabilities.
pub struct PageDocument<B: BrowserTrait> {
    browser: Arc<B>,
    tab: B::TabHandle,
    script_timeout: Duration,
}

impl<B: BrowserTrait> PageDocument<B> {
    pub fn new(browser: Arc<B>, tab: B::TabHandle, script_timeout: Duration) -> Self {
        Self {
            browser,
            tab,
            script_timeout,
        }
    }

    /// Location after redirects, which may differ from what was navigated to.
    pub async fn current_url(&self) -> Result<String> {
        self.browser.get_url(&self.tab).await
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.browser.navigate(&self.tab, url).await
    }

    pub async fn close(&self) -> Result<()> {
        self.browser.close().await
    }

    async fn run<T: DeserializeOwned>(&self, script: String) -> Result<Option<T>> {
        if !self.browser.is_running() {
            return Err(AutofillError::BrowserNotLaunched);
        }
        JavaScriptRunner::evaluate(self.browser.as_ref(), &self.tab, &script, self.script_timeout)
            .await
    }

    async fn run_unit(&self, script: String) -> Result<()> {
        self.run::<bool>(script).await.map(|_| ())
    }
}

#[async_trait]
impl<B: BrowserTrait> DocumentQuery for PageDocument<B> {
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>> {
        Ok(self.run::<u64>(javascript::query(selector)).await?.map(NodeHandle))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        let ids: Option<Vec<u64>> = self.run(javascript::query_all(selector)).await?;
        Ok(ids.unwrap_or_default().into_iter().map(NodeHandle).collect())
    }

    async fn query_within(&self, scope: NodeHandle, selector: &str) -> Result<Vec<NodeHandle>> {
        let ids: Option<Vec<u64>> = self.run(javascript::query_within(scope, selector)).await?;
        Ok(ids.unwrap_or_default().into_iter().map(NodeHandle).collect())
    }

    async fn describe(&self, node: NodeHandle) -> Result<Option<ElementSnapshot>> {
        self.run(javascript::describe(node)).await
    }

    async fn next_siblings(&self, node: NodeHandle, limit: usize) -> Result<Vec<NodeHandle>> {
        let ids: Option<Vec<u64>> = self.run(javascript::next_siblings(node, limit)).await?;
        Ok(ids.unwrap_or_default().into_iter().map(NodeHandle).collect())
    }

    async fn enclosing(&self, node: NodeHandle, selector: &str) -> Result<Option<NodeHandle>> {
        Ok(self
            .run::<u64>(javascript::enclosing(node, selector))
            .await?
            .map(NodeHandle))
    }
}

#[async_trait]
impl<B: BrowserTrait> ElementWriter for PageDocument<B> {
    async fn read_value(&self, node: NodeHandle) -> Result<Option<String>> {
        self.run(javascript::read_value(node)).await
    }

    async fn value_tracking(&self, node: NodeHandle) -> Result<ValueTracking> {
        let tracking: Option<ValueTracking> = self.run(javascript::value_tracking(node)).await?;
        Ok(tracking.unwrap_or(ValueTracking::Plain))
    }

    async fn set_value_native(&self, node: NodeHandle, value: &str) -> Result<()> {
        self.run_unit(javascript::set_value_native(node, value)).await
    }

    async fn set_tracked_value(&self, node: NodeHandle, value: &str) -> Result<()> {
        self.run_unit(javascript::set_tracked_value(node, value)).await
    }

    async fn assign_value(&self, node: NodeHandle, value: &str) -> Result<()> {
        self.run_unit(javascript::assign_value(node, value)).await
    }

    async fn dispatch(&self, node: NodeHandle, event: SyntheticEvent) -> Result<()> {
        self.run_unit(javascript::dispatch(node, event)).await
    }
}
