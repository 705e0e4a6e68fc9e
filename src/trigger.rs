use crate::autofill::events::{AutomationEvent, EventSink};
use crate::autofill::run::{AutomationRun, RunGuard, RunReport};
use crate::autofill::sequencer::run_sequence;
use crate::core::{Config, Page};
use crate::errors::{AutofillError, Result};
use crate::values::{FieldValues, ValueSource};
use regex::Regex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// What starts a run: an explicit command or a page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerCommand {
    /// Fill the current page now.
    Fill,
    /// The tab finished loading `url`.
    PageLoaded(String),
    Shutdown,
}

/// Owns everything a run needs and admits at most one run at a time.
pub struct Automator<P: Page + ?Sized> {
    page: Arc<P>,
    config: Config,
    values: Arc<dyn ValueSource>,
    sink: Arc<dyn EventSink>,
    guard: RunGuard,
    listing_paths: Vec<Regex>,
}

impl<P: Page + ?Sized> Automator<P> {
    pub fn new(
        page: Arc<P>,
        config: Config,
        values: Arc<dyn ValueSource>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let listing_paths = config
            .trigger
            .listing_path_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    AutofillError::ConfigurationError(format!("bad path pattern {}: {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            page,
            config,
            values,
            sink,
            guard: RunGuard::new(),
            listing_paths,
        })
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_active()
    }

    /// Start one run. Rejected with [`AutofillError::RunInProgress`] while
    /// another run holds the guard, and with
    /// [`AutofillError::MissingPrecondition`] before any DOM access when the
    /// title value is absent.
    pub async fn trigger(&self) -> Result<RunReport> {
        let Some(_permit) = self.guard.try_acquire() else {
            self.sink.emit(AutomationEvent::RunRejected {
                reason: "another run is in progress".to_string(),
            });
            return Err(AutofillError::RunInProgress);
        };

        let values = match FieldValues::load(self.values.as_ref()).await {
            Ok(values) => values,
            Err(err) => {
                self.sink.emit(AutomationEvent::RunAborted {
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        let run = AutomationRun::new();
        self.sink.emit(AutomationEvent::RunStarted {
            run_id: run.run_id.to_string(),
        });
        let fields = values.field_specs(&self.config.fields);
        Ok(run_sequence(self.page.as_ref(), &self.config, run, fields, self.sink.as_ref()).await)
    }

    /// Secondary trigger: run automatically when `url` is a listing-creation
    /// page and there is something to fill.
    pub async fn on_page_load(&self, url: &str) -> Result<Option<RunReport>> {
        if !self.config.trigger.auto_trigger || !self.is_listing_page(url) {
            debug!(url, "page load ignored");
            return Ok(None);
        }

        match FieldValues::load(self.values.as_ref()).await {
            Ok(values) if values.has_fillable() => {}
            Ok(_) => {
                debug!(url, "listing page loaded with nothing to fill");
                return Ok(None);
            }
            Err(AutofillError::MissingPrecondition(key)) => {
                debug!(url, key = %key, "listing page loaded before values exist");
                return Ok(None);
            }
            Err(err) => return Err(err),
        }

        info!(url, "listing page detected, starting run");
        self.trigger().await.map(Some)
    }

    pub fn is_listing_page(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self
                .listing_paths
                .iter()
                .any(|pattern| pattern.is_match(parsed.path())),
            Err(err) => {
                debug!(url, error = %err, "unparseable page url");
                false
            }
        }
    }

    /// Handle commands one at a time until `Shutdown` or the sender is gone.
    /// Returns the reports of every completed run.
    pub async fn serve(&self, mut commands: mpsc::Receiver<TriggerCommand>) -> Vec<RunReport> {
        let mut reports = Vec::new();

        while let Some(command) = commands.recv().await {
            let outcome = match command {
                TriggerCommand::Fill => self.trigger().await.map(Some),
                TriggerCommand::PageLoaded(url) => self.on_page_load(&url).await,
                TriggerCommand::Shutdown => break,
            };
            match outcome {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(err) if err.is_run_fatal() => warn!(error = %err, "run not started"),
                Err(err) => warn!(error = %err, "run failed"),
            }
        }

        reports
    }
}
