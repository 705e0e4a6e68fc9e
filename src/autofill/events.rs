use crate::autofill::run::{RunReport, Strategy};
use crate::autofill::sequencer::SequencerState;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Everything the engine reports. Components never log free text; they
/// hand one of these to the injected [`EventSink`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AutomationEvent {
    RunStarted {
        run_id: String,
    },
    RunRejected {
        reason: String,
    },
    RunAborted {
        reason: String,
    },
    StateChanged {
        state: SequencerState,
    },
    ReadinessReached {
        elapsed_ms: u64,
    },
    ReadinessTimeout {
        elapsed_ms: u64,
        forms: usize,
        value_inputs: usize,
        interactive: usize,
    },
    CascadeAttempt {
        field: String,
        attempt: u32,
    },
    StrategyFailed {
        field: String,
        strategy: Strategy,
        reason: String,
    },
    FieldResolved {
        field: String,
        strategy: Strategy,
        attempts: u32,
        elapsed_ms: u64,
    },
    CorrectiveWrite {
        field: String,
        observed: Option<String>,
    },
    ValueCommitted {
        field: String,
        matched: bool,
    },
    /// User-facing warning: the field was left untouched or wrong.
    FieldSkipped {
        field: String,
        reason: String,
    },
    RunCompleted {
        report: RunReport,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: AutomationEvent);
}

/// Default sink: structured `tracing` output with `field`, `strategy` and
/// `outcome` fields.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: AutomationEvent) {
        match event {
            AutomationEvent::RunStarted { run_id } => {
                info!(run_id = %run_id, outcome = "started", "automation run")
            }
            AutomationEvent::RunRejected { reason } => {
                warn!(outcome = "rejected", reason = %reason, "automation run")
            }
            AutomationEvent::RunAborted { reason } => {
                warn!(outcome = "aborted", reason = %reason, "automation run")
            }
            AutomationEvent::StateChanged { state } => {
                debug!(state = ?state, "sequencer transition")
            }
            AutomationEvent::ReadinessReached { elapsed_ms } => {
                info!(outcome = "ready", elapsed_ms, "page readiness")
            }
            AutomationEvent::ReadinessTimeout {
                elapsed_ms,
                forms,
                value_inputs,
                interactive,
            } => warn!(
                outcome = "timeout",
                elapsed_ms,
                forms,
                value_inputs,
                interactive,
                "page readiness not reached, continuing"
            ),
            AutomationEvent::CascadeAttempt { field, attempt } => debug!(
                field = %field,
                strategy = Strategy::Cascade.as_str(),
                attempt,
                "selector cascade attempt"
            ),
            AutomationEvent::StrategyFailed {
                field,
                strategy,
                reason,
            } => debug!(
                field = %field,
                strategy = strategy.as_str(),
                outcome = "miss",
                reason = %reason,
                "locator strategy exhausted"
            ),
            AutomationEvent::FieldResolved {
                field,
                strategy,
                attempts,
                elapsed_ms,
            } => info!(
                field = %field,
                strategy = strategy.as_str(),
                outcome = "resolved",
                attempts,
                elapsed_ms,
                "field resolved"
            ),
            AutomationEvent::CorrectiveWrite { field, observed } => warn!(
                field = %field,
                outcome = "corrective_write",
                observed = ?observed,
                "read-back mismatch, retrying with direct write"
            ),
            AutomationEvent::ValueCommitted { field, matched } => {
                let outcome = if matched { "committed" } else { "soft_failure" };
                info!(field = %field, outcome, "value committed")
            }
            AutomationEvent::FieldSkipped { field, reason } => {
                warn!(field = %field, outcome = "skipped", reason = %reason, "field not filled")
            }
            AutomationEvent::RunCompleted { report } => info!(
                run_id = %report.run_id,
                outcome = "completed",
                filled = report.filled_count(),
                fields = report.fields.len(),
                page_ready = report.page_ready,
                "automation run"
            ),
        }
    }
}
