pub mod autofill;
pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod testing;
pub mod trigger;
pub mod types;
pub mod utils;
pub mod values;

pub use autofill::{
    AutomationEvent, AutomationRun, EventSink, FieldFailure, FieldSpec, RunReport, Strategy,
    TracingSink,
};
pub use browser::{ChromeBrowser, PageDocument};
pub use crate::core::{Config, DocumentQuery, ElementWriter, Page};
pub use dom::MemoryDocument;
pub use errors::{AutofillError, Result};
pub use trigger::{Automator, TriggerCommand};
pub use types::*;
pub use values::{FieldValues, JsonFileValueStore, MemoryValueStore, ValueSnapshot, ValueSource};
