use crate::core::{BrowserTrait, Config};
use crate::errors::{AutofillError, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use parking_lot::Mutex;
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;

/// Chrome browser implementation
pub struct ChromeBrowser {
    browser: Mutex<Option<Arc<Browser>>>,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        Self {
            browser: Mutex::new(None),
        }
    }
}

/// Run a synchronous headless_chrome call on the blocking pool so the
/// calling future can be suspended and timed out while Chrome works.
pub(crate) async fn run_blocking<T, F>(on_panic: fn(String) -> AutofillError, call: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| on_panic(e.to_string()))?
}

impl Default for ChromeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    type TabHandle = Arc<Tab>;

    async fn launch(&mut self, config: &Config) -> Result<()> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!(
                "--window-size={},{}",
                config.browser.viewport.width, config.browser.viewport.height
            ),
        ];

        if let Some(ua) = &config.browser.user_agent {
            args.push(format!("--user-agent={}", ua));
        }

        if config.browser.disable_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }

        args.extend(config.browser.args.iter().cloned());

        let headless = config.browser.headless;
        // LaunchOptions borrows its args, so it is built on the blocking thread
        let browser = run_blocking(AutofillError::LaunchFailed, move || {
            let launch_options = LaunchOptions::default_builder()
                .headless(headless)
                .args(args.iter().map(OsStr::new).collect())
                .build()
                .map_err(|e| AutofillError::LaunchFailed(e.to_string()))?;

            Browser::new(launch_options).map_err(|e| AutofillError::LaunchFailed(e.to_string()))
        })
        .await?;

        tracing::info!(headless, "chrome launched");
        *self.browser.lock() = Some(Arc::new(browser));
        Ok(())
    }

    async fn new_tab(&self) -> Result<Self::TabHandle> {
        let browser = self
            .browser
            .lock()
            .clone()
            .ok_or(AutofillError::BrowserNotLaunched)?;

        run_blocking(AutofillError::TabCreationFailed, move || {
            browser
                .new_tab()
                .map_err(|e| AutofillError::TabCreationFailed(e.to_string()))
        })
        .await
    }

    async fn navigate(&self, tab: &Self::TabHandle, url: &str) -> Result<()> {
        let tab = Arc::clone(tab);
        let url = url.to_string();

        run_blocking(AutofillError::NavigationFailed, move || {
            tab.navigate_to(&url)
                .map_err(|e| AutofillError::NavigationFailed(e.to_string()))?;

            tab.wait_until_navigated()
                .map_err(|e| AutofillError::NavigationFailed(e.to_string()))?;

            Ok(())
        })
        .await
    }

    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value> {
        let tab = Arc::clone(tab);
        let script = script.to_string();

        run_blocking(AutofillError::JavaScriptFailed, move || {
            let result = tab
                .evaluate(&script, false)
                .map_err(AutofillError::from_any_error)?;

            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
    }

    async fn get_url(&self, tab: &Self::TabHandle) -> Result<String> {
        Ok(tab.get_url())
    }

    fn is_running(&self) -> bool {
        self.browser.lock().is_some()
    }

    async fn close(&self) -> Result<()> {
        let Some(browser) = self.browser.lock().take() else {
            return Ok(());
        };

        // dropping the last handle waits for the chrome process to exit
        run_blocking(AutofillError::JavaScriptFailed, move || {
            drop(browser);
            Ok(())
        })
        .await?;
        tracing::info!("chrome closed");
        Ok(())
    }
}
