use crate::autofill::commit::{verify_committed_value, write_controlled_value};
use crate::autofill::events::{AutomationEvent, EventSink};
use crate::autofill::field::{in_commit_order, FieldSpec};
use crate::autofill::readiness::await_readiness;
use crate::autofill::retry::resolve_field;
use crate::autofill::run::{AutomationRun, FieldFailure, FieldResult, RunReport};
use crate::core::{Config, Page};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "field_index", rename_all = "snake_case")]
pub enum SequencerState {
    Idle,
    AwaitingReadiness,
    FillingField(usize),
    Verifying(usize),
    Done,
}

/// Drives one run: readiness gate, then resolve and commit every field in
/// commit order. A field that cannot be filled is recorded and skipped; it
/// never stops the fields after it.
pub async fn run_sequence<P: Page + ?Sized>(
    page: &P,
    config: &Config,
    mut run: AutomationRun,
    fields: Vec<FieldSpec>,
    sink: &dyn EventSink,
) -> RunReport {
    let transition = |state: SequencerState| sink.emit(AutomationEvent::StateChanged { state });
    let settle_delay = Duration::from_millis(config.sequencer.settle_delay_ms);

    transition(SequencerState::AwaitingReadiness);
    run.page_ready = await_readiness(page, &config.readiness, sink).await;

    for (index, field) in in_commit_order(fields).into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(settle_delay).await;
        }
        transition(SequencerState::FillingField(index));
        let result = fill_field(page, config, &field, index, sink, &transition).await;
        run.record(result);
    }

    transition(SequencerState::Done);
    let report = run.finish();
    sink.emit(AutomationEvent::RunCompleted {
        report: report.clone(),
    });
    report
}

async fn fill_field<P: Page + ?Sized>(
    page: &P,
    config: &Config,
    field: &FieldSpec,
    index: usize,
    sink: &dyn EventSink,
    transition: &impl Fn(SequencerState),
) -> FieldResult {
    let resolution = resolve_field(page, field, &config.resolution, sink).await;

    let Some(node) = resolution.element else {
        sink.emit(AutomationEvent::FieldSkipped {
            field: field.field_id.clone(),
            reason: "no interactable element found".to_string(),
        });
        let last_error = resolution.last_error.clone();
        return FieldResult {
            resolution,
            commit: None,
            failure: Some(FieldFailure::NotFound { last_error }),
        };
    };

    let committed = async {
        let tracking = write_controlled_value(page, node, &field.value).await?;
        transition(SequencerState::Verifying(index));
        verify_committed_value(page, &field.field_id, node, &field.value, tracking, sink).await
    };
    match committed.await {
        Ok(commit) => {
            let failure = (!commit.matched).then(|| FieldFailure::ValueMismatchAfterCommit {
                expected: commit.committed_value.clone(),
                observed: commit.observed_value.clone(),
            });
            if failure.is_some() {
                sink.emit(AutomationEvent::FieldSkipped {
                    field: field.field_id.clone(),
                    reason: format!(
                        "page kept {:?} instead of the committed value",
                        commit.observed_value.as_deref().unwrap_or_default()
                    ),
                });
            }
            FieldResult {
                resolution,
                commit: Some(commit),
                failure,
            }
        }
        Err(err) => {
            sink.emit(AutomationEvent::FieldSkipped {
                field: field.field_id.clone(),
                reason: err.to_string(),
            });
            FieldResult {
                resolution,
                commit: None,
                failure: Some(FieldFailure::CommitError {
                    message: err.to_string(),
                }),
            }
        }
    }
}
