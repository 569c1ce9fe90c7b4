use anyhow::Result;
use chrono::{DateTime, Utc};
use duckdb::params;

use pagesight_core::event::{DeviceType, Domain, Event, EventType, NewSession, Session};
use pagesight_core::filter::Predicate;
use pagesight_core::period::Window;
use pagesight_core::store::{Dimension, EventStore, GroupedCount, SessionStart};

use crate::backend::{format_ts, parse_ts, rand_hex, DuckDbBackend};
use crate::predicate::render;

const EVENT_COLUMNS: &str = "id, domain_id, event_type, href, referrer, \
     CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR), \
     unique_visitor_id, session_id, \
     country, country_code, region, city, latitude, longitude, \
     browser, browser_version, os, os_version, device, device_vendor, \
     device_model, engine, engine_version, cpu_architecture, \
     bot, utm_source, utm_medium, utm_campaign";

/// An events row with timestamps still in their VARCHAR-cast form;
/// converted outside the row closure so parse failures surface as
/// storage errors instead of being swallowed per row.
struct EventRow {
    id: String,
    domain_id: String,
    event_type: String,
    href: String,
    referrer: Option<String>,
    created_at: String,
    updated_at: String,
    unique_visitor_id: Option<String>,
    session_id: Option<String>,
    country: String,
    country_code: String,
    region: String,
    city: String,
    latitude: String,
    longitude: String,
    browser: String,
    browser_version: String,
    os: String,
    os_version: String,
    device: String,
    device_vendor: String,
    device_model: String,
    engine: String,
    engine_version: String,
    cpu_architecture: String,
    bot: bool,
    utm_source: Option<String>,
    utm_medium: Option<String>,
    utm_campaign: Option<String>,
}

fn map_event_row(row: &duckdb::Row<'_>) -> std::result::Result<EventRow, duckdb::Error> {
    Ok(EventRow {
        id: row.get(0)?,
        domain_id: row.get(1)?,
        event_type: row.get(2)?,
        href: row.get(3)?,
        referrer: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        unique_visitor_id: row.get(7)?,
        session_id: row.get(8)?,
        country: row.get(9)?,
        country_code: row.get(10)?,
        region: row.get(11)?,
        city: row.get(12)?,
        latitude: row.get(13)?,
        longitude: row.get(14)?,
        browser: row.get(15)?,
        browser_version: row.get(16)?,
        os: row.get(17)?,
        os_version: row.get(18)?,
        device: row.get(19)?,
        device_vendor: row.get(20)?,
        device_model: row.get(21)?,
        engine: row.get(22)?,
        engine_version: row.get(23)?,
        cpu_architecture: row.get(24)?,
        bot: row.get(25)?,
        utm_source: row.get(26)?,
        utm_medium: row.get(27)?,
        utm_campaign: row.get(28)?,
    })
}

impl EventRow {
    fn into_event(self) -> Result<Event> {
        Ok(Event {
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            domain_id: self.domain_id,
            // PAGE_VIEW is the only stored type today.
            event_type: EventType::PageView,
            href: self.href,
            referrer: self.referrer,
            unique_visitor_id: self.unique_visitor_id,
            session_id: self.session_id,
            country: self.country,
            country_code: self.country_code,
            region: self.region,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            browser: self.browser,
            browser_version: self.browser_version,
            os: self.os,
            os_version: self.os_version,
            device: DeviceType::parse(&self.device),
            device_vendor: self.device_vendor,
            device_model: self.device_model,
            engine: self.engine,
            engine_version: self.engine_version,
            cpu_architecture: self.cpu_architecture,
            bot: self.bot,
            utm_source: self.utm_source,
            utm_medium: self.utm_medium,
            utm_campaign: self.utm_campaign,
        })
    }
}

fn dimension_column(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Referrer => "referrer",
        Dimension::Page => "href",
        Dimension::Country => "country",
        Dimension::Region => "region",
        Dimension::City => "city",
        Dimension::Browser => "browser",
        Dimension::Os => "os",
        Dimension::Device => "device",
    }
}

#[async_trait::async_trait]
impl EventStore for DuckDbBackend {
    async fn find_domain(&self, name: &str) -> Result<Option<Domain>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, CAST(created_at AS VARCHAR) FROM domains WHERE name = ?1",
        )?;
        let row: Option<(String, String, String)> = match stmt
            .query_row(params![name], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            }) {
            Ok(row) => Some(row),
            Err(duckdb::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };
        row.map(|(id, name, created_at)| {
            Ok(Domain {
                id,
                name,
                created_at: parse_ts(&created_at)?,
            })
        })
        .transpose()
    }

    async fn insert_domain(&self, name: &str) -> Result<Domain> {
        let conn = self.conn.lock().await;
        let domain = Domain {
            id: format!("dom_{}", rand_hex(8)),
            name: name.to_lowercase(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO domains (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![domain.id, domain.name, format_ts(domain.created_at)],
        )?;
        Ok(domain)
    }

    async fn insert_event(&self, event: &Event) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO events (
                id, domain_id, event_type, href, referrer,
                created_at, updated_at, unique_visitor_id, session_id,
                country, country_code, region, city, latitude, longitude,
                browser, browser_version, os, os_version, device,
                device_vendor, device_model, engine, engine_version,
                cpu_architecture, bot, utm_source, utm_medium, utm_campaign
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24,
                ?25, ?26, ?27, ?28, ?29
            )",
            params![
                event.id,
                event.domain_id,
                event.event_type.as_str(),
                event.href,
                event.referrer,
                format_ts(event.created_at),
                format_ts(event.updated_at),
                event.unique_visitor_id,
                event.session_id,
                event.country,
                event.country_code,
                event.region,
                event.city,
                event.latitude,
                event.longitude,
                event.browser,
                event.browser_version,
                event.os,
                event.os_version,
                event.device.as_str(),
                event.device_vendor,
                event.device_model,
                event.engine,
                event.engine_version,
                event.cpu_architecture,
                event.bot,
                event.utm_source,
                event.utm_medium,
                event.utm_campaign,
            ],
        )?;
        Ok(())
    }

    async fn find_recent_session(
        &self,
        visitor_id: &str,
        domain_id: &str,
        created_after: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let conn = self.conn.lock().await;
        // A session is "recent" if any event already linked to it falls
        // inside the inactivity window, not just its opening event, so
        // long sessions keep absorbing activity as long as gaps stay
        // under the window.
        let mut stmt = conn.prepare(
            "SELECT s.id, s.unique_visitor_id, s.domain_id, CAST(s.created_at AS VARCHAR) \
             FROM sessions s \
             JOIN events e ON e.session_id = s.id \
             WHERE s.unique_visitor_id = ?1 AND s.domain_id = ?2 AND e.created_at >= ?3 \
             ORDER BY e.created_at DESC LIMIT 1",
        )?;
        let row: Option<(String, String, String, String)> = match stmt.query_row(
            params![visitor_id, domain_id, format_ts(created_after)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        ) {
            Ok(row) => Some(row),
            Err(duckdb::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };
        row.map(|(id, unique_visitor_id, domain_id, created_at)| {
            Ok(Session {
                id,
                unique_visitor_id,
                domain_id,
                created_at: parse_ts(&created_at)?,
            })
        })
        .transpose()
    }

    async fn create_session_linking_event(
        &self,
        session: NewSession,
        event_id: &str,
    ) -> Result<Session> {
        let mut conn = self.conn.lock().await;
        let created = Session {
            id: rand_hex(16),
            unique_visitor_id: session.unique_visitor_id,
            domain_id: session.domain_id,
            created_at: session.created_at,
        };

        // Session insert and event update are one transaction, so a
        // failure cannot leave an orphaned session or a dangling link.
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, unique_visitor_id, domain_id, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                created.id,
                created.unique_visitor_id,
                created.domain_id,
                format_ts(created.created_at),
            ],
        )?;
        tx.execute(
            "UPDATE events SET session_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![created.id, format_ts(Utc::now()), event_id],
        )?;
        tx.commit()?;

        Ok(created)
    }

    async fn update_event_session(&self, event_id: &str, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE events SET session_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![session_id, format_ts(Utc::now()), event_id],
        )?;
        Ok(())
    }

    async fn query_events(
        &self,
        domain_id: &str,
        predicate: &Predicate,
        window: &Window,
        require_session: bool,
    ) -> Result<Vec<Event>> {
        let conn = self.conn.lock().await;
        let rendered = render(predicate, 4, "");
        let session_clause = if require_session {
            " AND session_id IS NOT NULL"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE domain_id = ?1 AND created_at >= ?2 AND created_at <= ?3\
             {}{session_clause} \
             ORDER BY created_at ASC",
            rendered.clauses
        );

        let mut params_all: Vec<Box<dyn duckdb::types::ToSql>> = vec![
            Box::new(domain_id.to_string()),
            Box::new(format_ts(window.from)),
            Box::new(format_ts(window.to)),
        ];
        params_all.extend(rendered.params);
        let param_refs: Vec<&dyn duckdb::types::ToSql> =
            params_all.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), map_event_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }

    async fn query_session_starts(
        &self,
        domain_id: &str,
        predicate: &Predicate,
        window: &Window,
    ) -> Result<Vec<SessionStart>> {
        let conn = self.conn.lock().await;
        let rendered = render(predicate, 4, "e.");
        let sql = format!(
            "SELECT DISTINCT s.id, CAST(s.created_at AS VARCHAR) \
             FROM events e JOIN sessions s ON e.session_id = s.id \
             WHERE e.domain_id = ?1 AND e.created_at >= ?2 AND e.created_at <= ?3{}",
            rendered.clauses
        );

        let mut params_all: Vec<Box<dyn duckdb::types::ToSql>> = vec![
            Box::new(domain_id.to_string()),
            Box::new(format_ts(window.from)),
            Box::new(format_ts(window.to)),
        ];
        params_all.extend(rendered.params);
        let param_refs: Vec<&dyn duckdb::types::ToSql> =
            params_all.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            let id: String = row.get(0)?;
            let created_at: String = row.get(1)?;
            Ok((id, created_at))
        })?;

        let mut starts = Vec::new();
        for row in rows {
            let (session_id, created_at) = row?;
            starts.push(SessionStart {
                session_id,
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(starts)
    }

    async fn group_count(
        &self,
        domain_id: &str,
        predicate: &Predicate,
        window: &Window,
        dimension: Dimension,
    ) -> Result<Vec<GroupedCount>> {
        let conn = self.conn.lock().await;
        let column = dimension_column(dimension);
        let rendered = render(predicate, 4, "");
        let sql = format!(
            "SELECT {column}, COUNT(*) AS cnt FROM events \
             WHERE domain_id = ?1 AND created_at >= ?2 AND created_at <= ?3{} \
             GROUP BY {column} \
             ORDER BY cnt DESC, {column} ASC",
            rendered.clauses
        );

        let mut params_all: Vec<Box<dyn duckdb::types::ToSql>> = vec![
            Box::new(domain_id.to_string()),
            Box::new(format_ts(window.from)),
            Box::new(format_ts(window.to)),
        ];
        params_all.extend(rendered.params);
        let param_refs: Vec<&dyn duckdb::types::ToSql> =
            params_all.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(GroupedCount {
                value: row.get(0)?,
                count: row.get(1)?,
            })
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    async fn count_recent_visitors(&self, domain_id: &str, since: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .prepare(
                "SELECT COUNT(DISTINCT unique_visitor_id) FROM events \
                 WHERE domain_id = ?1 AND created_at > ?2 \
                 AND unique_visitor_id IS NOT NULL AND bot = FALSE",
            )?
            .query_row(params![domain_id, format_ts(since)], |row| row.get(0))?;
        Ok(count)
    }
}
