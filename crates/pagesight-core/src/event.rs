use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered tracked site. Events are only accepted for domains that
/// exist; the name is stored lowercase and compared lowercase.
#[derive(Debug, Clone, Serialize)]
pub struct Domain {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "PAGE_VIEW")]
    PageView,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageView => "PAGE_VIEW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "Desktop",
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
        }
    }

    /// Stored values round-trip through the database as plain strings.
    /// Anything unrecognized classifies as Desktop, mirroring ingestion.
    pub fn parse(value: &str) -> Self {
        match value {
            "Mobile" => DeviceType::Mobile,
            "Tablet" => DeviceType::Tablet,
            _ => DeviceType::Desktop,
        }
    }
}

/// The payload the tracking snippet posts. Wire field names are
/// single-letter to keep the beacon small: `n` = event name, `h` = href,
/// `d` = declared domain, `r` = referrer, `t` = optional event time for
/// replayed/backfilled events (defaults to now at ingestion).
#[derive(Debug, Clone, Deserialize)]
pub struct RawPageView {
    #[serde(rename = "n")]
    pub event_type: EventType,
    #[serde(rename = "h")]
    pub href: String,
    #[serde(rename = "d")]
    pub domain: String,
    #[serde(rename = "r", default)]
    pub referrer: Option<String>,
    #[serde(rename = "t", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Request metadata the transport layer extracts for the ingestor.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip: String,
    pub user_agent: String,
}

/// A stored page-view event, enriched at ingestion time.
///
/// Immutable after creation except `session_id` and `updated_at`, which
/// the session stitcher sets exactly once. Enrichment fields that could
/// not be resolved hold the `"Unknown"` sentinel rather than NULL; only
/// `referrer` (genuinely absent on direct traffic), `unique_visitor_id`
/// (NULL on legacy rows) and `session_id` (NULL until stitched) are
/// optional.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub domain_id: String,
    pub event_type: EventType,
    pub href: String,
    pub referrer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub unique_visitor_id: Option<String>,
    pub session_id: Option<String>,
    pub country: String,
    pub country_code: String,
    pub region: String,
    pub city: String,
    pub latitude: String,
    pub longitude: String,
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device: DeviceType,
    pub device_vendor: String,
    pub device_model: String,
    pub engine: String,
    pub engine_version: String,
    pub cpu_architecture: String,
    pub bot: bool,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

/// Groups one visitor's events under a 30-minute inactivity window.
///
/// `created_at` equals the `created_at` of the event that opened the
/// session and never changes. There is no closed state; a session stops
/// receiving events implicitly once the window elapses.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub unique_visitor_id: String,
    pub domain_id: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a session about to be created; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub unique_visitor_id: String,
    pub domain_id: String,
    pub created_at: DateTime<Utc>,
}
