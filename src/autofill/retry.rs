use crate::autofill::cascade::resolve_by_selectors;
use crate::autofill::events::{AutomationEvent, EventSink};
use crate::autofill::field::FieldSpec;
use crate::autofill::heuristic::scan_inputs;
use crate::autofill::run::{ResolutionOutcome, Strategy};
use crate::autofill::textual::{locate_by_text, TextualOptions};
use crate::core::config::ResolutionConfig;
use crate::core::DocumentQuery;
use crate::types::NodeHandle;
use std::time::Duration;
use tokio::time::Instant;

/// Resolve one field: the selector cascade up to `max_attempts` times with
/// linear backoff between attempts, then the textual fallback, then the
/// heuristic scan. Never fails; a miss is `Strategy::None` with no element.
pub async fn resolve_field<D: DocumentQuery + ?Sized>(
    doc: &D,
    field: &FieldSpec,
    config: &ResolutionConfig,
    sink: &dyn EventSink,
) -> ResolutionOutcome {
    let started = Instant::now();
    let cascade_timeout = Duration::from_millis(config.cascade_timeout_ms);
    let poll_interval = Duration::from_millis(config.cascade_poll_interval_ms);
    let backoff_base = Duration::from_millis(config.backoff_base_ms);

    let mut attempts = 0;
    let mut last_error = None;

    if !field.candidate_selectors.is_empty() {
        for attempt in 1..=config.max_attempts {
            attempts = attempt;
            sink.emit(AutomationEvent::CascadeAttempt {
                field: field.field_id.clone(),
                attempt,
            });

            match resolve_by_selectors(doc, &field.candidate_selectors, cascade_timeout, poll_interval)
                .await
            {
                Ok(node) => {
                    return resolved(field, node, Strategy::Cascade, attempts, started, None, sink);
                }
                Err(miss) => last_error = miss.last_error.or(last_error),
            }

            if attempt < config.max_attempts {
                tokio::time::sleep(backoff_base * attempt).await;
            }
        }
    }
    sink.emit(AutomationEvent::StrategyFailed {
        field: field.field_id.clone(),
        strategy: Strategy::Cascade,
        reason: last_error
            .clone()
            .unwrap_or_else(|| "no candidate selector matched".to_string()),
    });

    let options = TextualOptions {
        sibling_walk_limit: config.sibling_walk_limit,
        max_label_text_len: config.max_label_text_len,
    };
    if let Some(node) = locate_by_text(doc, field, options).await {
        return resolved(field, node, Strategy::Textual, attempts, started, last_error, sink);
    }
    sink.emit(AutomationEvent::StrategyFailed {
        field: field.field_id.clone(),
        strategy: Strategy::Textual,
        reason: "no keyword label led to an interactable input".to_string(),
    });

    if let Some(node) = scan_inputs(doc, field).await {
        return resolved(field, node, Strategy::Heuristic, attempts, started, last_error, sink);
    }
    sink.emit(AutomationEvent::StrategyFailed {
        field: field.field_id.clone(),
        strategy: Strategy::Heuristic,
        reason: "no input passed the structural scan".to_string(),
    });

    ResolutionOutcome {
        field_id: field.field_id.clone(),
        role: field.role,
        element: None,
        strategy: Strategy::None,
        attempts,
        elapsed: started.elapsed(),
        last_error,
    }
}

fn resolved(
    field: &FieldSpec,
    node: NodeHandle,
    strategy: Strategy,
    attempts: u32,
    started: Instant,
    last_error: Option<String>,
    sink: &dyn EventSink,
) -> ResolutionOutcome {
    let elapsed = started.elapsed();
    sink.emit(AutomationEvent::FieldResolved {
        field: field.field_id.clone(),
        strategy,
        attempts,
        elapsed_ms: elapsed.as_millis() as u64,
    });
    ResolutionOutcome {
        field_id: field.field_id.clone(),
        role: field.role,
        element: Some(node),
        strategy,
        attempts,
        elapsed,
        last_error,
    }
}
