use crate::autofill::field::FieldRole;
use crate::types::{NodeHandle, ValueTracking};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Locator strategy that produced (or failed to produce) an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Cascade,
    Textual,
    Heuristic,
    None,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Cascade => "cascade",
            Strategy::Textual => "textual",
            Strategy::Heuristic => "heuristic",
            Strategy::None => "none",
        }
    }
}

/// Result of locating one field's element. Holds a live handle, so it never
/// outlives the run that produced it.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub field_id: String,
    pub role: FieldRole,
    pub element: Option<NodeHandle>,
    pub strategy: Strategy,
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub field_id: String,
    pub committed_value: String,
    pub observed_value: Option<String>,
    pub matched: bool,
    pub tracking: ValueTracking,
    pub corrective_write: bool,
}

/// Per-field failures. All of them are recovered locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldFailure {
    NotFound {
        last_error: Option<String>,
    },
    ValueMismatchAfterCommit {
        expected: String,
        observed: Option<String>,
    },
    /// The page rejected a write outright (usually a re-render detached the
    /// element between resolution and commit).
    CommitError {
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct FieldResult {
    pub resolution: ResolutionOutcome,
    pub commit: Option<CommitOutcome>,
    pub failure: Option<FieldFailure>,
}

/// One execution of the sequencer against the page.
#[derive(Debug)]
pub struct AutomationRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub field_results: Vec<FieldResult>,
    pub page_ready: bool,
}

impl AutomationRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            field_results: Vec::new(),
            page_ready: false,
        }
    }

    pub fn record(&mut self, result: FieldResult) {
        self.field_results.push(result);
    }

    /// Close the run. Element handles are dropped here and only the
    /// handle-free report survives.
    pub fn finish(self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            page_ready: self.page_ready,
            fields: self
                .field_results
                .into_iter()
                .map(FieldReport::from)
                .collect(),
        }
    }
}

impl Default for AutomationRun {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldReport {
    pub field_id: String,
    pub role: FieldRole,
    pub strategy: Strategy,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub commit: Option<CommitOutcome>,
    pub failure: Option<FieldFailure>,
}

impl FieldReport {
    pub fn filled(&self) -> bool {
        self.commit.as_ref().map(|c| c.matched).unwrap_or(false)
    }
}

impl From<FieldResult> for FieldReport {
    fn from(result: FieldResult) -> Self {
        Self {
            field_id: result.resolution.field_id,
            role: result.resolution.role,
            strategy: result.resolution.strategy,
            attempts: result.resolution.attempts,
            elapsed_ms: result.resolution.elapsed.as_millis() as u64,
            commit: result.commit,
            failure: result.failure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub page_ready: bool,
    pub fields: Vec<FieldReport>,
}

impl RunReport {
    pub fn filled_count(&self) -> usize {
        self.fields.iter().filter(|f| f.filled()).count()
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldReport> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }
}

/// At-most-one-run gate for a page.
#[derive(Debug, Default)]
pub struct RunGuard {
    in_flight: AtomicBool,
}

/// Held for the duration of a run; releases the guard on drop.
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { guard: self })
    }

    pub fn is_active(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(field_id: &str, element: Option<NodeHandle>) -> ResolutionOutcome {
        ResolutionOutcome {
            field_id: field_id.to_string(),
            role: FieldRole::Identifier,
            element,
            strategy: if element.is_some() {
                Strategy::Cascade
            } else {
                Strategy::None
            },
            attempts: 1,
            elapsed: Duration::from_millis(42),
            last_error: None,
        }
    }

    #[test]
    fn test_guard_allows_one_permit_at_a_time() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire();
        assert!(permit.is_some());
        assert!(guard.is_active());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_active());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_report_carries_no_handles_and_counts_fills() {
        let mut run = AutomationRun::new();
        run.page_ready = true;
        run.record(FieldResult {
            resolution: resolution("identifier", Some(NodeHandle(3))),
            commit: Some(CommitOutcome {
                field_id: "identifier".to_string(),
                committed_value: "SKU-1".to_string(),
                observed_value: Some("SKU-1".to_string()),
                matched: true,
                tracking: ValueTracking::Plain,
                corrective_write: false,
            }),
            failure: None,
        });
        run.record(FieldResult {
            resolution: resolution("price", None),
            commit: None,
            failure: Some(FieldFailure::NotFound { last_error: None }),
        });

        let report = run.finish();
        assert_eq!(report.filled_count(), 1);
        assert_eq!(report.field("identifier").unwrap().elapsed_ms, 42);
        assert_eq!(report.field("price").unwrap().strategy, Strategy::None);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.to_string().find("element").is_none());
        assert_eq!(json["fields"][1]["failure"]["kind"], "not_found");
    }
}
