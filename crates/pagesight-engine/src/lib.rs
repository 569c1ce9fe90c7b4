//! The Pagesight engine: event ingestion, session stitching, and
//! aggregation over an [`EventStore`], plus the concrete enrichment
//! collaborators (GeoIP, user-agent parsing, bot detection, referrer
//! naming). [`Analytics`] is the single entry point an embedding
//! process talks to; transport and auth live outside this crate.

pub mod aggregate;
pub mod bot;
pub mod geo;
mod ingest;
pub mod referrer;
pub mod session;
pub mod ua;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use pagesight_core::config::Config;
use pagesight_core::enrich::{BotDetector, GeoLookup, ReferrerNames, UserAgentParser};
use pagesight_core::error::EngineError;
use pagesight_core::event::{Domain, Event, RawPageView, RequestMeta};
use pagesight_core::filter::{self, FilterSet};
use pagesight_core::period::{Period, Window};
use pagesight_core::store::{Dimension, EventStore};
use pagesight_core::visitor;

pub use aggregate::{BreakdownRow, TimeSeriesPoint};
pub use bot::PatternBotDetector;
pub use geo::MaxMindGeo;
pub use referrer::StaticReferrerNames;
pub use ua::WootheeParser;

/// Common query parameters for the stats operations. `period` defaults
/// to the trailing seven days and `date` to now, so an empty query is a
/// valid "last week" request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub period: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub filters: FilterSet,
}

/// The analytics service: owns the store and the enrichment
/// collaborators, exposes ingestion and the read operations.
pub struct Analytics {
    store: Arc<dyn EventStore>,
    geo: Arc<dyn GeoLookup>,
    ua: Arc<dyn UserAgentParser>,
    bots: Arc<dyn BotDetector>,
    referrer_names: Arc<dyn ReferrerNames>,
    session_window: Duration,
    all_time_origin: DateTime<Utc>,
}

impl Analytics {
    /// Build with the default collaborators (MaxMind geo at the
    /// configured path, woothee UA parsing, pattern bot detection, the
    /// built-in referrer table).
    pub fn new(store: Arc<dyn EventStore>, config: &Config) -> Self {
        Self::with_collaborators(
            store,
            Arc::new(MaxMindGeo::new(&config.geoip_path)),
            Arc::new(WootheeParser),
            Arc::new(PatternBotDetector),
            Arc::new(StaticReferrerNames),
            config,
        )
    }

    /// Build with explicit collaborators. Tests use this to inject
    /// deterministic geo and UA results.
    pub fn with_collaborators(
        store: Arc<dyn EventStore>,
        geo: Arc<dyn GeoLookup>,
        ua: Arc<dyn UserAgentParser>,
        bots: Arc<dyn BotDetector>,
        referrer_names: Arc<dyn ReferrerNames>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            geo,
            ua,
            bots,
            referrer_names,
            session_window: Duration::minutes(i64::from(config.session_window_minutes)),
            all_time_origin: config.all_time_origin,
        }
    }

    /// Register a domain, or return the existing registration. Names
    /// are stored lowercase.
    pub async fn register_domain(&self, name: &str) -> Result<Domain, EngineError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(EngineError::validation("domain name must not be empty"));
        }
        if let Some(existing) = self.store.find_domain(&name).await? {
            return Ok(existing);
        }
        let domain = self.store.insert_domain(&name).await?;
        tracing::info!(domain = %domain.name, id = %domain.id, "registered domain");
        Ok(domain)
    }

    /// Ingest one page view: canonicalize, guard, enrich, persist, then
    /// stitch it onto a session.
    ///
    /// Validation failures (bad href, cross-site host) reject the event
    /// before any write. Enrichment failures degrade to sentinel values.
    /// A stitch failure is logged and swallowed: the persisted event
    /// stays, with a NULL session id.
    pub async fn ingest(
        &self,
        raw: &RawPageView,
        meta: &RequestMeta,
    ) -> Result<Event, EngineError> {
        let canonical = ingest::canonicalize_href(&raw.href)?;
        let domain_name = raw.domain.trim().to_lowercase();

        // Cross-site guard: the href host must equal the declared domain
        // exactly. A `www.` variant is rejected too — accepting it would
        // store hrefs under a host no page filter ever compiles to.
        if canonical.host != domain_name {
            return Err(EngineError::validation(format!(
                "href host {:?} does not match domain {domain_name:?}",
                canonical.host
            )));
        }

        let domain = self
            .store
            .find_domain(&domain_name)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("domain {domain_name:?}")))?;

        // Event time, not wall-clock time, keys the visitor hash so
        // replayed events land under the identity of their day.
        let created_at = raw.timestamp.unwrap_or_else(Utc::now);
        let visitor_id = visitor::derive(&domain_name, &meta.ip, &meta.user_agent, created_at);

        let ua_info = self.ua.parse(&meta.user_agent);
        let geo_info = self.geo.lookup(&meta.ip).unwrap_or_default();
        let bot = self.bots.is_bot(&meta.user_agent);

        let mut event = ingest::build_event(
            raw,
            meta,
            &domain.id,
            canonical,
            geo_info,
            ua_info,
            visitor_id,
            bot,
            created_at,
        );
        self.store.insert_event(&event).await?;

        match session::attach(self.store.as_ref(), &event, self.session_window).await {
            Ok(session_id) => event.session_id = session_id,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "session stitch failed; event kept without session");
            }
        }

        tracing::debug!(
            domain = %domain.name,
            event_id = %event.id,
            session_id = ?event.session_id,
            bot = event.bot,
            "ingested page view"
        );
        Ok(event)
    }

    /// Bucketed views / visitors / sessions / engagement ratios over the
    /// resolved window.
    pub async fn time_series(
        &self,
        domain: &str,
        query: &StatsQuery,
    ) -> Result<Vec<TimeSeriesPoint>, EngineError> {
        let (domain, window, predicate) = self.prepare(domain, query).await?;
        let events = self
            .store
            .query_events(&domain.id, &predicate, &window, true)
            .await?;
        let starts = self
            .store
            .query_session_starts(&domain.id, &predicate, &window)
            .await?;
        Ok(aggregate::time_series(&events, &starts, &window))
    }

    /// Ranked labels for one dimension over the resolved window.
    pub async fn breakdown(
        &self,
        domain: &str,
        dimension: Dimension,
        query: &StatsQuery,
    ) -> Result<Vec<BreakdownRow>, EngineError> {
        let (domain, window, predicate) = self.prepare(domain, query).await?;
        let groups = self
            .store
            .group_count(&domain.id, &predicate, &window, dimension)
            .await?;
        Ok(aggregate::breakdown(
            dimension,
            groups,
            self.referrer_names.as_ref(),
        ))
    }

    /// Distinct visitors with an event in the trailing sixty seconds.
    pub async fn live_visitor_count(&self, domain: &str) -> Result<i64, EngineError> {
        let domain = self.find_domain(domain).await?;
        let since = Utc::now() - Duration::seconds(60);
        Ok(self.store.count_recent_visitors(&domain.id, since).await?)
    }

    async fn find_domain(&self, name: &str) -> Result<Domain, EngineError> {
        let name = name.trim().to_lowercase();
        self.store
            .find_domain(&name)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("domain {name:?}")))
    }

    /// Shared front half of both read families: resolve the domain, the
    /// window, and the filter predicate.
    async fn prepare(
        &self,
        domain: &str,
        query: &StatsQuery,
    ) -> Result<(Domain, Window, filter::Predicate), EngineError> {
        let domain = self.find_domain(domain).await?;
        let period = Period::parse(query.period.as_deref().unwrap_or("7d"))?;
        let date = query.date.unwrap_or_else(Utc::now);
        let window = period.resolve(date, self.all_time_origin);
        let mut predicate = filter::compile(&domain.name, &query.filters)?;
        // Crawlers never count toward stats, regardless of filters.
        predicate.push(filter::Condition::ExcludeBots);
        Ok((domain, window, predicate))
    }
}
