use chrono::{DateTime, Duration, Utc};
use pagesight_core::{
    enrich::UNKNOWN,
    event::{DeviceType, Event, EventType, NewSession},
    filter::{self, Condition, FilterSet},
    period::{default_all_time_origin, Period},
    store::{Dimension, EventStore},
};
use pagesight_duckdb::DuckDbBackend;

fn at(s: &str) -> DateTime<Utc> {
    s.parse().expect("test timestamp")
}

fn sample_event(domain_id: &str, created_at: DateTime<Utc>) -> Event {
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        domain_id: domain_id.to_string(),
        event_type: EventType::PageView,
        href: "https://example.com/pricing".to_string(),
        referrer: Some("https://www.linkedin.com/feed".to_string()),
        created_at,
        updated_at: created_at,
        unique_visitor_id: Some("visitor_1".to_string()),
        session_id: None,
        country: "Poland".to_string(),
        country_code: "PL".to_string(),
        region: "Mazovia".to_string(),
        city: "Warsaw".to_string(),
        latitude: UNKNOWN.to_string(),
        longitude: UNKNOWN.to_string(),
        browser: "Firefox".to_string(),
        browser_version: "124".to_string(),
        os: "Linux".to_string(),
        os_version: UNKNOWN.to_string(),
        device: DeviceType::Desktop,
        device_vendor: UNKNOWN.to_string(),
        device_model: UNKNOWN.to_string(),
        engine: UNKNOWN.to_string(),
        engine_version: UNKNOWN.to_string(),
        cpu_architecture: UNKNOWN.to_string(),
        bot: false,
        utm_source: None,
        utm_medium: None,
        utm_campaign: None,
    }
}

fn day_window(date: &str) -> pagesight_core::period::Window {
    Period::Day.resolve(at(date), default_all_time_origin())
}

#[tokio::test]
async fn domain_round_trip() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");

    assert!(store.find_domain("example.com").await.unwrap().is_none());

    let domain = store.insert_domain("Example.COM").await.unwrap();
    assert_eq!(domain.name, "example.com");
    assert!(domain.id.starts_with("dom_"));

    let found = store.find_domain("example.com").await.unwrap().unwrap();
    assert_eq!(found.id, domain.id);
}

#[tokio::test]
async fn event_round_trip_preserves_all_fields() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    let mut event = sample_event(&domain.id, at("2024-03-15T10:00:00Z"));
    event.utm_source = Some("newsletter".to_string());
    store.insert_event(&event).await.unwrap();

    let predicate = filter::compile("example.com", &FilterSet::default()).unwrap();
    let window = day_window("2024-03-15T12:00:00Z");
    let events = store
        .query_events(&domain.id, &predicate, &window, false)
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    let stored = &events[0];
    assert_eq!(stored.id, event.id);
    assert_eq!(stored.href, event.href);
    assert_eq!(stored.referrer, event.referrer);
    assert_eq!(stored.created_at, event.created_at);
    assert_eq!(stored.country_code, "PL");
    assert_eq!(stored.device, DeviceType::Desktop);
    assert_eq!(stored.utm_source.as_deref(), Some("newsletter"));
    assert!(!stored.bot);
    assert!(stored.session_id.is_none());
}

#[tokio::test]
async fn session_create_links_the_event_transactionally() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    let opened_at = at("2024-03-15T10:00:00Z");
    let event = sample_event(&domain.id, opened_at);
    store.insert_event(&event).await.unwrap();

    let session = store
        .create_session_linking_event(
            NewSession {
                unique_visitor_id: "visitor_1".to_string(),
                domain_id: domain.id.clone(),
                created_at: opened_at,
            },
            &event.id,
        )
        .await
        .unwrap();
    assert_eq!(session.created_at, opened_at);

    let predicate = filter::compile("example.com", &FilterSet::default()).unwrap();
    let window = day_window("2024-03-15T12:00:00Z");
    let events = store
        .query_events(&domain.id, &predicate, &window, true)
        .await
        .unwrap();
    assert_eq!(events[0].session_id.as_deref(), Some(session.id.as_str()));
}

#[tokio::test]
async fn recent_session_lookup_respects_the_cutoff() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    let opened_at = at("2024-03-15T10:00:00Z");
    let event = sample_event(&domain.id, opened_at);
    store.insert_event(&event).await.unwrap();
    let session = store
        .create_session_linking_event(
            NewSession {
                unique_visitor_id: "visitor_1".to_string(),
                domain_id: domain.id.clone(),
                created_at: opened_at,
            },
            &event.id,
        )
        .await
        .unwrap();

    // Cutoff before creation: found.
    let hit = store
        .find_recent_session("visitor_1", &domain.id, opened_at - Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(hit.map(|s| s.id), Some(session.id.clone()));

    // Cutoff after creation: the window has elapsed.
    let miss = store
        .find_recent_session("visitor_1", &domain.id, opened_at + Duration::minutes(1))
        .await
        .unwrap();
    assert!(miss.is_none());

    // Other visitors never match.
    let other = store
        .find_recent_session("visitor_2", &domain.id, opened_at - Duration::minutes(30))
        .await
        .unwrap();
    assert!(other.is_none());
}

#[tokio::test]
async fn update_event_session_is_reflected_in_queries() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    let first = sample_event(&domain.id, at("2024-03-15T10:00:00Z"));
    store.insert_event(&first).await.unwrap();
    let session = store
        .create_session_linking_event(
            NewSession {
                unique_visitor_id: "visitor_1".to_string(),
                domain_id: domain.id.clone(),
                created_at: first.created_at,
            },
            &first.id,
        )
        .await
        .unwrap();

    let second = sample_event(&domain.id, at("2024-03-15T10:10:00Z"));
    store.insert_event(&second).await.unwrap();
    store
        .update_event_session(&second.id, &session.id)
        .await
        .unwrap();

    let predicate = filter::compile("example.com", &FilterSet::default()).unwrap();
    let window = day_window("2024-03-15T12:00:00Z");
    let starts = store
        .query_session_starts(&domain.id, &predicate, &window)
        .await
        .unwrap();
    // Two events, one distinct session.
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].session_id, session.id);
    assert_eq!(starts[0].created_at, first.created_at);
}

#[tokio::test]
async fn predicates_filter_and_bots_are_excludable() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    let human = sample_event(&domain.id, at("2024-03-15T10:00:00Z"));
    store.insert_event(&human).await.unwrap();

    let mut crawler = sample_event(&domain.id, at("2024-03-15T10:05:00Z"));
    crawler.bot = true;
    store.insert_event(&crawler).await.unwrap();

    let mut direct = sample_event(&domain.id, at("2024-03-15T10:06:00Z"));
    direct.referrer = None;
    direct.browser = "Chrome".to_string();
    store.insert_event(&direct).await.unwrap();

    let window = day_window("2024-03-15T12:00:00Z");

    let mut no_bots = filter::compile("example.com", &FilterSet::default()).unwrap();
    no_bots.push(Condition::ExcludeBots);
    let events = store
        .query_events(&domain.id, &no_bots, &window, false)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| !e.bot));

    let linkedin = filter::compile(
        "example.com",
        &FilterSet {
            referrer: Some("https://www.linkedin.com".to_string()),
            ..FilterSet::default()
        },
    )
    .unwrap();
    let events = store
        .query_events(&domain.id, &linkedin, &window, false)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);

    let by_browser = filter::compile(
        "example.com",
        &FilterSet {
            browser: Some("Chrome".to_string()),
            ..FilterSet::default()
        },
    )
    .unwrap();
    let events = store
        .query_events(&domain.id, &by_browser, &window, false)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, direct.id);
}

#[tokio::test]
async fn group_count_orders_and_groups_nulls() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    for i in 0..3 {
        let mut e = sample_event(&domain.id, at("2024-03-15T10:00:00Z"));
        e.created_at += Duration::minutes(i);
        store.insert_event(&e).await.unwrap();
    }
    let mut direct = sample_event(&domain.id, at("2024-03-15T11:00:00Z"));
    direct.referrer = None;
    store.insert_event(&direct).await.unwrap();

    let predicate = filter::compile("example.com", &FilterSet::default()).unwrap();
    let window = day_window("2024-03-15T12:00:00Z");
    let groups = store
        .group_count(&domain.id, &predicate, &window, Dimension::Referrer)
        .await
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(
        groups[0].value.as_deref(),
        Some("https://www.linkedin.com/feed")
    );
    assert_eq!(groups[0].count, 3);
    assert_eq!(groups[1].value, None);
    assert_eq!(groups[1].count, 1);
}

#[tokio::test]
async fn events_outside_the_window_are_invisible() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    store
        .insert_event(&sample_event(&domain.id, at("2024-03-14T23:59:00Z")))
        .await
        .unwrap();
    store
        .insert_event(&sample_event(&domain.id, at("2024-03-15T00:01:00Z")))
        .await
        .unwrap();

    let predicate = filter::compile("example.com", &FilterSet::default()).unwrap();
    let window = day_window("2024-03-15T12:00:00Z");
    let events = store
        .query_events(&domain.id, &predicate, &window, false)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].created_at, at("2024-03-15T00:01:00Z"));
}

#[tokio::test]
async fn count_recent_visitors_deduplicates() {
    let store = DuckDbBackend::open_in_memory().expect("in-memory db");
    let domain = store.insert_domain("example.com").await.unwrap();

    let now = Utc::now();
    for visitor in ["visitor_1", "visitor_1", "visitor_2"] {
        let mut e = sample_event(&domain.id, now - Duration::seconds(10));
        e.unique_visitor_id = Some(visitor.to_string());
        store.insert_event(&e).await.unwrap();
    }
    let mut stale = sample_event(&domain.id, now - Duration::minutes(10));
    stale.unique_visitor_id = Some("visitor_3".to_string());
    store.insert_event(&stale).await.unwrap();

    // Crawlers are invisible to the live count, like every other read.
    let mut crawler = sample_event(&domain.id, now - Duration::seconds(5));
    crawler.unique_visitor_id = Some("visitor_4".to_string());
    crawler.bot = true;
    store.insert_event(&crawler).await.unwrap();

    let count = store
        .count_recent_visitors(&domain.id, now - Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(count, 2);
}
