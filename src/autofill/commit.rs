use crate::autofill::events::{AutomationEvent, EventSink};
use crate::autofill::run::CommitOutcome;
use crate::core::ElementWriter;
use crate::errors::Result;
use crate::types::{NodeHandle, SyntheticEvent, ValueTracking};

const COMMIT_EVENTS: [SyntheticEvent; 3] = [
    SyntheticEvent::Input,
    SyntheticEvent::Change,
    SyntheticEvent::Blur,
];
const CORRECTIVE_EVENTS: [SyntheticEvent; 2] = [SyntheticEvent::Input, SyntheticEvent::Change];

/// Commit `value` to `node` and verify it by reading it back.
///
/// A read-back mismatch gets exactly one corrective plain write. If the
/// value still differs the outcome has `matched == false`; it is never
/// reported as committed while the page shows something else. `Err` is
/// reserved for writes the page refused outright, such as a detached node.
pub async fn commit_controlled_value<W: ElementWriter + ?Sized>(
    writer: &W,
    field_id: &str,
    node: NodeHandle,
    value: &str,
    sink: &dyn EventSink,
) -> Result<CommitOutcome> {
    let tracking = write_controlled_value(writer, node, value).await?;
    verify_committed_value(writer, field_id, node, value, tracking, sink).await
}

/// Write `value` so that a reactive framework registers it, then dispatch
/// the commit events.
///
/// Frameworks that intercept the `value` setter keep a shadow copy of the
/// last value they saw and compare it with the DOM when `input` fires. A
/// plain assignment updates both, so the framework sees no change and
/// re-renders its own state. The shadowed path writes through the native
/// setter and resets the shadow copy to the previous value first.
pub async fn write_controlled_value<W: ElementWriter + ?Sized>(
    writer: &W,
    node: NodeHandle,
    value: &str,
) -> Result<ValueTracking> {
    let previous = writer.read_value(node).await?.unwrap_or_default();
    let tracking = writer.value_tracking(node).await?;

    match tracking {
        ValueTracking::Shadowed => {
            writer.set_value_native(node, value).await?;
            writer.set_tracked_value(node, &previous).await?;
        }
        ValueTracking::Plain => writer.assign_value(node, value).await?,
    }
    for event in COMMIT_EVENTS {
        writer.dispatch(node, event).await?;
    }
    Ok(tracking)
}

/// Read back what the page kept after [`write_controlled_value`], with one
/// corrective plain write on mismatch.
pub async fn verify_committed_value<W: ElementWriter + ?Sized>(
    writer: &W,
    field_id: &str,
    node: NodeHandle,
    value: &str,
    tracking: ValueTracking,
    sink: &dyn EventSink,
) -> Result<CommitOutcome> {
    let mut observed = writer.read_value(node).await?;
    let mut corrective_write = false;

    if observed.as_deref() != Some(value) {
        sink.emit(AutomationEvent::CorrectiveWrite {
            field: field_id.to_string(),
            observed: observed.clone(),
        });
        corrective_write = true;
        writer.assign_value(node, value).await?;
        for event in CORRECTIVE_EVENTS {
            writer.dispatch(node, event).await?;
        }
        observed = writer.read_value(node).await?;
    }

    let matched = observed.as_deref() == Some(value);
    sink.emit(AutomationEvent::ValueCommitted {
        field: field_id.to_string(),
        matched,
    });

    Ok(CommitOutcome {
        field_id: field_id.to_string(),
        committed_value: value.to_string(),
        observed_value: observed,
        matched,
        tracking,
        corrective_write,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use crate::errors::AutofillError;
    use crate::testing::RecordingSink;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use crate::types::SyntheticEvent::{Blur, Change, Input};

    const PAGE: &str = r#"
        <form>
          <input id="plain" type="text" value="old">
          <input id="controlled" type="text" data-controlled value="old">
          <input id="frozen" type="text" data-frozen value="locked">
        </form>
    "#;

    #[tokio::test]
    async fn test_plain_input_commits_with_full_event_sequence() {
        let doc = MemoryDocument::new(PAGE);
        let node = doc.handle_for("#plain").unwrap();
        let sink = RecordingSink::new();

        let outcome = commit_controlled_value(&doc, "identifier", node, "SKU-1", &sink)
            .await
            .unwrap();

        assert!(outcome.matched);
        assert!(!outcome.corrective_write);
        assert_eq!(outcome.tracking, ValueTracking::Plain);
        assert_eq!(outcome.observed_value.as_deref(), Some("SKU-1"));
        assert_eq!(doc.events_for(node), vec![Input, Change, Blur]);
    }

    #[tokio::test]
    async fn test_controlled_input_accepts_native_write() {
        let doc = MemoryDocument::new(PAGE);
        let node = doc.handle_for("#controlled").unwrap();
        let sink = RecordingSink::new();

        let outcome = commit_controlled_value(&doc, "price", node, "16.32", &sink)
            .await
            .unwrap();

        assert!(outcome.matched);
        assert!(!outcome.corrective_write);
        assert_eq!(outcome.tracking, ValueTracking::Shadowed);
        assert_eq!(doc.value_of("#controlled").as_deref(), Some("16.32"));
        assert_eq!(doc.events_for(node), vec![Input, Change, Blur]);
        assert!(sink.events().iter().all(|event| !matches!(
            event,
            AutomationEvent::CorrectiveWrite { .. }
        )));
    }

    #[tokio::test]
    async fn test_reverting_input_ends_in_soft_failure() {
        let doc = MemoryDocument::new(PAGE);
        let node = doc.handle_for("#frozen").unwrap();
        let sink = RecordingSink::new();

        let outcome = commit_controlled_value(&doc, "price", node, "16.32", &sink)
            .await
            .unwrap();

        assert!(!outcome.matched);
        assert!(outcome.corrective_write);
        assert_eq!(outcome.observed_value.as_deref(), Some("locked"));
        assert_eq!(doc.events_for(node), vec![Input, Change, Blur, Input, Change]);

        let events = sink.events();
        assert!(matches!(
            &events[0],
            AutomationEvent::CorrectiveWrite { observed, .. } if observed.as_deref() == Some("locked")
        ));
        assert!(matches!(
            &events[1],
            AutomationEvent::ValueCommitted { matched: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_detached_node_is_an_error() {
        let doc = MemoryDocument::new(PAGE);
        let sink = RecordingSink::new();
        let err = commit_controlled_value(&doc, "price", NodeHandle(10_000), "1", &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, AutofillError::StaleElement(10_000)));
        assert!(sink.events().is_empty());
    }

    /// Writer that records every call and can be told to drop native writes.
    #[derive(Default)]
    struct ScriptedInput {
        tracking: Option<ValueTracking>,
        ignore_native_writes: bool,
        value: Mutex<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedInput {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ElementWriter for ScriptedInput {
        async fn read_value(&self, _node: NodeHandle) -> Result<Option<String>> {
            self.calls.lock().push("read".to_string());
            Ok(Some(self.value.lock().clone()))
        }

        async fn value_tracking(&self, _node: NodeHandle) -> Result<ValueTracking> {
            Ok(self.tracking.unwrap_or(ValueTracking::Plain))
        }

        async fn set_value_native(&self, _node: NodeHandle, value: &str) -> Result<()> {
            self.calls.lock().push(format!("native:{}", value));
            if !self.ignore_native_writes {
                *self.value.lock() = value.to_string();
            }
            Ok(())
        }

        async fn set_tracked_value(&self, _node: NodeHandle, value: &str) -> Result<()> {
            self.calls.lock().push(format!("tracker:{}", value));
            Ok(())
        }

        async fn assign_value(&self, _node: NodeHandle, value: &str) -> Result<()> {
            self.calls.lock().push(format!("assign:{}", value));
            *self.value.lock() = value.to_string();
            Ok(())
        }

        async fn dispatch(&self, _node: NodeHandle, event: SyntheticEvent) -> Result<()> {
            self.calls.lock().push(event.as_str().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shadow_value_is_reset_to_previous_before_dispatch() {
        let input = ScriptedInput {
            tracking: Some(ValueTracking::Shadowed),
            value: Mutex::new("9.99".to_string()),
            ..Default::default()
        };
        let sink = RecordingSink::new();
        commit_controlled_value(&input, "price", NodeHandle(1), "16.32", &sink)
            .await
            .unwrap();

        assert_eq!(
            input.calls(),
            vec![
                "read",
                "native:16.32",
                "tracker:9.99",
                "input",
                "change",
                "blur",
                "read"
            ]
        );
    }

    #[tokio::test]
    async fn test_corrective_write_recovers_dropped_native_write() {
        let input = ScriptedInput {
            tracking: Some(ValueTracking::Shadowed),
            ignore_native_writes: true,
            ..Default::default()
        };
        let sink = RecordingSink::new();
        let outcome = commit_controlled_value(&input, "identifier", NodeHandle(1), "SKU-1", &sink)
            .await
            .unwrap();

        assert!(outcome.matched);
        assert!(outcome.corrective_write);
        let calls = input.calls();
        // the corrective path never touches the shadow value
        let corrective = &calls[calls.iter().position(|c| c == "blur").unwrap() + 2..];
        assert_eq!(corrective, ["assign:SKU-1", "input", "change", "read"]);
        assert_eq!(calls.iter().filter(|c| c.starts_with("tracker")).count(), 1);
    }

    #[tokio::test]
    async fn test_write_step_leaves_verification_to_caller() {
        let input = ScriptedInput {
            tracking: Some(ValueTracking::Shadowed),
            ignore_native_writes: true,
            ..Default::default()
        };

        let tracking = write_controlled_value(&input, NodeHandle(1), "16.32")
            .await
            .unwrap();

        assert_eq!(tracking, ValueTracking::Shadowed);
        // one read for the previous value, none for verification
        assert_eq!(input.calls().iter().filter(|c| *c == "read").count(), 1);
        assert_eq!(input.calls().last().map(String::as_str), Some("blur"));
    }

    proptest! {
        #[test]
        fn prop_commit_never_claims_a_match_it_did_not_observe(
            value in "[A-Za-z0-9 .-]{0,16}",
            selector in prop::sample::select(vec!["#plain", "#controlled", "#frozen"]),
        ) {
            let doc = MemoryDocument::new(PAGE);
            let node = doc.handle_for(selector).unwrap();
            let sink = RecordingSink::new();
            let outcome = tokio_test::block_on(
                commit_controlled_value(&doc, "field", node, &value, &sink),
            )
            .unwrap();

            let observed = doc.value_of(selector);
            prop_assert_eq!(outcome.matched, observed.as_deref() == Some(value.as_str()));
            prop_assert_eq!(&outcome.observed_value, &observed);
            let events = doc.events_for(node);
            prop_assert_eq!(&events[..3], &[Input, Change, Blur][..]);
        }
    }
}
