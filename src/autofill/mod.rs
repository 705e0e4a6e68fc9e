pub mod cascade;
pub mod commit;
pub mod events;
pub mod field;
pub mod heuristic;
pub mod readiness;
pub mod retry;
pub mod run;
pub mod sequencer;
pub mod textual;
pub mod visibility;

pub use commit::{commit_controlled_value, verify_committed_value, write_controlled_value};
pub use events::{AutomationEvent, EventSink, TracingSink};
pub use field::{FieldRole, FieldSpec, FieldTemplate, InputKind};
pub use retry::resolve_field;
pub use run::{AutomationRun, FieldFailure, FieldReport, RunGuard, RunReport, Strategy};
pub use sequencer::{run_sequence, SequencerState};
pub use visibility::is_interactable;
