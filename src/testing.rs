use crate::autofill::events::{AutomationEvent, EventSink};
use crate::core::config::{ReadinessConfig, ResolutionConfig, SequencerConfig};
use crate::core::Config;
use parking_lot::Mutex;

/// A listing form that passes readiness and matches the default field
/// templates: a plain SKU input and a framework-controlled price input.
pub const LISTING_PAGE: &str = r#"
<html><body>
  <form id="listing">
    <label for="title">Title</label>
    <input id="title" name="title" type="text" value="Vintage lamp">
    <label for="sku">SKU</label>
    <input id="sku" name="sku" type="text" maxlength="50">
    <label for="price">Price</label>
    <input id="price" name="price" type="number" data-controlled>
    <select name="condition"><option>Used</option></select>
    <button type="button">Preview</button>
    <button type="submit">List item</button>
  </form>
</body></html>
"#;

/// Sink that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AutomationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AutomationEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&AutomationEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AutomationEvent) {
        self.events.lock().push(event);
    }
}

/// Default config with every wait shrunk so paused-clock tests stay short.
pub fn fast_config() -> Config {
    Config {
        resolution: ResolutionConfig {
            cascade_timeout_ms: 200,
            cascade_poll_interval_ms: 50,
            max_attempts: 2,
            backoff_base_ms: 50,
            ..ResolutionConfig::default()
        },
        readiness: ReadinessConfig {
            timeout_ms: 300,
            poll_interval_ms: 50,
            min_interactive_elements: 2,
        },
        sequencer: SequencerConfig {
            settle_delay_ms: 20,
        },
        ..Config::default()
    }
}
