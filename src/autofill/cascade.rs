use crate::autofill::visibility::is_interactable;
use crate::core::DocumentQuery;
use crate::types::NodeHandle;
use std::time::Duration;
use tokio::time::Instant;

/// The cascade ran out of time. Not an error: the caller moves on to the
/// next strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeMiss {
    pub last_error: Option<String>,
    pub passes: u32,
}

/// Try `selectors` in order, most specific first, until one yields an
/// interactable element or `timeout` elapses.
///
/// Each pass re-queries the whole list so a more specific selector that
/// appears late in hydration still wins over a generic one. At least one
/// full pass always runs.
pub async fn resolve_by_selectors<D: DocumentQuery + ?Sized>(
    doc: &D,
    selectors: &[String],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<NodeHandle, CascadeMiss> {
    let deadline = Instant::now() + timeout;
    let mut last_error = None;
    let mut passes = 0;

    loop {
        passes += 1;
        for selector in selectors {
            match doc.query_all(selector).await {
                Ok(candidates) if candidates.is_empty() => {}
                Ok(candidates) => {
                    for candidate in candidates {
                        if is_interactable(doc, Some(candidate)).await {
                            return Ok(candidate);
                        }
                    }
                    last_error = Some(format!("'{}' matched only hidden or disabled elements", selector));
                }
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(CascadeMiss { last_error, passes });
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
