use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{Domain, Event, NewSession, Session};
use crate::filter::Predicate;
use crate::period::Window;

/// A categorical dimension events can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Referrer,
    Page,
    Country,
    Region,
    City,
    Browser,
    Os,
    Device,
}

/// One grouped-count row. `value` is `None` for the NULL group — today
/// that only happens for referrer (direct traffic).
#[derive(Debug, Clone, Serialize)]
pub struct GroupedCount {
    pub value: Option<String>,
    pub count: i64,
}

/// A session's id and creation time, joined from events that matched a
/// query. The aggregator buckets sessions by `created_at`.
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// The storage contract the engine consumes. Implementations own all
/// persistence concerns (transactions, indexes, retries); errors come
/// back as `anyhow::Error` and propagate unchanged through the engine.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    async fn find_domain(&self, name: &str) -> Result<Option<Domain>>;

    async fn insert_domain(&self, name: &str) -> Result<Domain>;

    /// Persist a fully enriched event. The caller assigns the id.
    async fn insert_event(&self, event: &Event) -> Result<()>;

    /// The visitor's most recent session on this domain with linked-event
    /// activity at or after `created_after`, if any. Activity means any
    /// event already pointing at the session, so an old session stays
    /// joinable while its gaps stay under the inactivity window.
    async fn find_recent_session(
        &self,
        visitor_id: &str,
        domain_id: &str,
        created_after: DateTime<Utc>,
    ) -> Result<Option<Session>>;

    /// Create a session and point the event at it in one transaction, so
    /// a failure cannot leave a session nobody references.
    async fn create_session_linking_event(
        &self,
        session: NewSession,
        event_id: &str,
    ) -> Result<Session>;

    async fn update_event_session(&self, event_id: &str, session_id: &str) -> Result<()>;

    /// Events for `domain_id` inside the window matching `predicate`,
    /// ordered by `created_at` ascending. With `require_session`, rows
    /// with a NULL session id (legacy data) are excluded.
    async fn query_events(
        &self,
        domain_id: &str,
        predicate: &Predicate,
        window: &Window,
        require_session: bool,
    ) -> Result<Vec<Event>>;

    /// Distinct (session id, session created_at) pairs over the sessions
    /// referenced by matching events in the window.
    async fn query_session_starts(
        &self,
        domain_id: &str,
        predicate: &Predicate,
        window: &Window,
    ) -> Result<Vec<SessionStart>>;

    /// Grouped event counts by `dimension`, pushed into storage rather
    /// than reduced in process.
    async fn group_count(
        &self,
        domain_id: &str,
        predicate: &Predicate,
        window: &Window,
        dimension: Dimension,
    ) -> Result<Vec<GroupedCount>>;

    /// Distinct visitor ids with at least one event since `since`.
    async fn count_recent_visitors(&self, domain_id: &str, since: DateTime<Utc>) -> Result<i64>;
}
