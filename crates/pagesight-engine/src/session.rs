use chrono::Duration;

use pagesight_core::error::EngineError;
use pagesight_core::event::{Event, NewSession};
use pagesight_core::store::EventStore;

/// Attach a freshly ingested event to its session.
///
/// Looks for the visitor's most recent session on the domain inside the
/// inactivity window ending at the event's timestamp; creates one when
/// nothing matches. Returns the session id, or `None` for events without
/// a visitor id (legacy rows are skipped, not errored).
///
/// Known race, accepted as in the original system: two first events for
/// the same visitor arriving concurrently into an empty window can each
/// create a session. The create path is transactional (session insert +
/// event update atomic) so the guarantee is at-least-one-session; any
/// duplicate is left to an external reconciliation pass.
pub async fn attach(
    store: &dyn EventStore,
    event: &Event,
    window: Duration,
) -> Result<Option<String>, EngineError> {
    let Some(visitor_id) = event.unique_visitor_id.as_deref() else {
        return Ok(None);
    };

    let cutoff = event.created_at - window;
    match store
        .find_recent_session(visitor_id, &event.domain_id, cutoff)
        .await?
    {
        Some(session) => {
            store.update_event_session(&event.id, &session.id).await?;
            Ok(Some(session.id))
        }
        None => {
            let session = store
                .create_session_linking_event(
                    NewSession {
                        unique_visitor_id: visitor_id.to_string(),
                        domain_id: event.domain_id.clone(),
                        created_at: event.created_at,
                    },
                    &event.id,
                )
                .await?;
            Ok(Some(session.id))
        }
    }
}
