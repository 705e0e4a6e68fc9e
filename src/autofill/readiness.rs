use crate::autofill::events::{AutomationEvent, EventSink};
use crate::core::config::ReadinessConfig;
use crate::core::DocumentQuery;
use std::time::Duration;
use tokio::time::Instant;

const FORMS: &str = "form";
const VALUE_INPUTS: &str = "input:not([type]), input[type='text'], input[type='number']";
const INTERACTIVE: &str = "button, input, select";

/// Coarse structural counts read in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessSignals {
    pub forms: usize,
    pub value_inputs: usize,
    pub interactive: usize,
}

impl ReadinessSignals {
    pub async fn read<D: DocumentQuery + ?Sized>(doc: &D) -> Self {
        Self {
            forms: count(doc, FORMS).await,
            value_inputs: count(doc, VALUE_INPUTS).await,
            interactive: count(doc, INTERACTIVE).await,
        }
    }

    pub fn is_ready(&self, min_interactive: usize) -> bool {
        self.forms > 0 && self.value_inputs > 0 && self.interactive > min_interactive
    }
}

async fn count<D: DocumentQuery + ?Sized>(doc: &D, selector: &str) -> usize {
    doc.query_all(selector).await.map(|nodes| nodes.len()).unwrap_or(0)
}

/// Poll until the page looks interactive or the timeout passes.
///
/// Returns whether readiness was reached. A timeout is reported through the
/// sink and is not an error: the caller proceeds either way.
pub async fn await_readiness<D: DocumentQuery + ?Sized>(
    doc: &D,
    config: &ReadinessConfig,
    sink: &dyn EventSink,
) -> bool {
    let started = Instant::now();
    let deadline = started + Duration::from_millis(config.timeout_ms);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    loop {
        let signals = ReadinessSignals::read(doc).await;
        if signals.is_ready(config.min_interactive_elements) {
            sink.emit(AutomationEvent::ReadinessReached {
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            return true;
        }

        let now = Instant::now();
        if now >= deadline {
            sink.emit(AutomationEvent::ReadinessTimeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
                forms: signals.forms,
                value_inputs: signals.value_inputs,
                interactive: signals.interactive,
            });
            return false;
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use crate::testing::RecordingSink;
    use std::sync::Arc;

    fn config(timeout_ms: u64) -> ReadinessConfig {
        ReadinessConfig {
            timeout_ms,
            poll_interval_ms: 100,
            min_interactive_elements: 3,
        }
    }

    const READY: &str = r#"
        <form>
          <input type="text"><input type="number"><select></select><button>Go</button>
        </form>
    "#;

    #[tokio::test(start_paused = true)]
    async fn test_all_three_signals_required() {
        let signals = ReadinessSignals::read(&MemoryDocument::new(READY)).await;
        assert_eq!(
            signals,
            ReadinessSignals {
                forms: 1,
                value_inputs: 2,
                interactive: 4
            }
        );
        assert!(signals.is_ready(3));
        assert!(!signals.is_ready(4));

        let no_form = MemoryDocument::new(
            r#"<input type="text"><input type="text"><button></button><button></button>"#,
        );
        assert!(!ReadinessSignals::read(&no_form).await.is_ready(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reached_after_late_render() {
        let doc = Arc::new(MemoryDocument::new("<div>loading</div>"));
        let renderer = doc.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            renderer.replace_html(READY);
        });

        let sink = RecordingSink::new();
        assert!(await_readiness(doc.as_ref(), &config(5_000), &sink).await);
        assert!(matches!(
            sink.events().last(),
            Some(AutomationEvent::ReadinessReached { elapsed_ms }) if *elapsed_ms >= 450
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_not_raised() {
        let doc = MemoryDocument::new("<form><input type='text'></form>");
        let sink = RecordingSink::new();
        let started = Instant::now();

        assert!(!await_readiness(&doc, &config(1_000), &sink).await);
        assert!(started.elapsed() >= Duration::from_millis(1_000));
        match sink.events().last() {
            Some(AutomationEvent::ReadinessTimeout {
                forms,
                value_inputs,
                interactive,
                ..
            }) => assert_eq!((*forms, *value_inputs, *interactive), (1, 1, 1)),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
