/// DuckDB initialization SQL.
///
/// Executed once at open time via `Connection::execute_batch`. Every
/// statement uses `IF NOT EXISTS` so re-running on startup is safe.
///
/// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
/// An explicit limit is always set — the DuckDB default (80% of system
/// RAM) is not acceptable for an embedded store. `threads = 2` caps the
/// background pool for single-writer use.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- DOMAINS (registered tracked sites)
-- ===========================================
CREATE TABLE IF NOT EXISTS domains (
    id              VARCHAR PRIMARY KEY,           -- 'dom_' + 16 hex chars
    name            VARCHAR NOT NULL UNIQUE,       -- lowercase hostname
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===========================================
-- SESSIONS
-- ===========================================
-- Sessions have no terminal state: a session is "closed" implicitly
-- once 30 minutes pass without a new event pointing at it. created_at
-- always equals the created_at of the event that opened the session.
CREATE TABLE IF NOT EXISTS sessions (
    id                  VARCHAR PRIMARY KEY,       -- 32 hex chars
    unique_visitor_id   VARCHAR NOT NULL,
    domain_id           VARCHAR NOT NULL,
    created_at          TIMESTAMP NOT NULL
);
-- Optimised for the stitcher's recent-session lookup
CREATE INDEX IF NOT EXISTS idx_sessions_visitor
    ON sessions(unique_visitor_id, created_at DESC);

-- ===========================================
-- EVENTS (main analytics table)
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id                  VARCHAR PRIMARY KEY,       -- UUID v4
    domain_id           VARCHAR NOT NULL,
    event_type          VARCHAR NOT NULL,          -- 'PAGE_VIEW'
    href                VARCHAR NOT NULL,          -- canonical absolute URL
    referrer            VARCHAR,                   -- NULL = direct traffic
    created_at          TIMESTAMP NOT NULL,        -- event time, not ingest time
    updated_at          TIMESTAMP NOT NULL,
    unique_visitor_id   VARCHAR,                   -- NULL on legacy rows
    session_id          VARCHAR,                   -- NULL until stitched

    -- GeoIP enrichment ('Unknown' sentinel when unresolved)
    country             VARCHAR NOT NULL,
    country_code        VARCHAR NOT NULL,
    region              VARCHAR NOT NULL,
    city                VARCHAR NOT NULL,
    latitude            VARCHAR NOT NULL,
    longitude           VARCHAR NOT NULL,

    -- User-agent enrichment ('Unknown' sentinel when unresolved)
    browser             VARCHAR NOT NULL,
    browser_version     VARCHAR NOT NULL,
    os                  VARCHAR NOT NULL,
    os_version          VARCHAR NOT NULL,
    device              VARCHAR NOT NULL,          -- Desktop | Mobile | Tablet
    device_vendor       VARCHAR NOT NULL,
    device_model        VARCHAR NOT NULL,
    engine              VARCHAR NOT NULL,
    engine_version      VARCHAR NOT NULL,
    cpu_architecture    VARCHAR NOT NULL,

    bot                 BOOLEAN NOT NULL DEFAULT FALSE,
    utm_source          VARCHAR,
    utm_medium          VARCHAR,
    utm_campaign        VARCHAR
);
-- Optimised for windowed statistics queries
CREATE INDEX IF NOT EXISTS idx_events_domain_created
    ON events(domain_id, created_at);
-- Optimised for the live-visitor count and visitor scans
CREATE INDEX IF NOT EXISTS idx_events_visitor_created
    ON events(unique_visitor_id, created_at);
"#
    )
}
