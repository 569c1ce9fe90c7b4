use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use pagesight_core::enrich::ReferrerNames;
use pagesight_core::event::Event;
use pagesight_core::filter::DIRECT_NONE;
use pagesight_core::period::Window;
use pagesight_core::store::{Dimension, GroupedCount, SessionStart};

/// One time-series bucket. `date` is the aligned bucket start.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesPoint {
    pub date: DateTime<Utc>,
    pub views: i64,
    pub unique_visitors: i64,
    pub sessions: i64,
    pub views_per_session: f64,
    pub bounce_rate: f64,
}

/// One ranked breakdown row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub label: String,
    pub count: i64,
}

/// Compute the bucketed series over a closed event set.
///
/// Iterates bucket anchors from `to` backward (one per data point) and
/// reverses at the end, so the result is chronologically ascending.
/// Sessions count in the bucket containing their `created_at` only;
/// views count wherever the event falls. Both ratios are exactly 0 for
/// bucket with no sessions.
pub fn time_series(
    events: &[Event],
    session_starts: &[SessionStart],
    window: &Window,
) -> Vec<TimeSeriesPoint> {
    let granularity = window.granularity;
    let data_points = window.data_points();
    let mut series = Vec::with_capacity(data_points as usize);

    for i in 0..data_points {
        let anchor = granularity.step_back(window.to, i);

        let bucket_events: Vec<&Event> = events
            .iter()
            .filter(|e| granularity.same_bucket(e.created_at, anchor))
            .collect();
        let views = bucket_events.len() as i64;

        let mut visitor_ids: Vec<&str> = bucket_events
            .iter()
            .filter_map(|e| e.unique_visitor_id.as_deref())
            .collect();
        visitor_ids.sort_unstable();
        visitor_ids.dedup();
        let unique_visitors = visitor_ids.len() as i64;

        let bucket_sessions: Vec<&SessionStart> = session_starts
            .iter()
            .filter(|s| granularity.same_bucket(s.created_at, anchor))
            .collect();
        let sessions = bucket_sessions.len() as i64;

        let mut views_per_session = 0.0;
        let mut bounce_rate = 0.0;
        if sessions > 0 {
            views_per_session = views as f64 / sessions as f64;
            let bounced = bucket_sessions
                .iter()
                .filter(|s| {
                    bucket_events
                        .iter()
                        .filter(|e| e.session_id.as_deref() == Some(s.session_id.as_str()))
                        .count()
                        == 1
                })
                .count();
            bounce_rate = bounced as f64 / sessions as f64;
        }

        series.push(TimeSeriesPoint {
            date: granularity.truncate(anchor),
            views,
            unique_visitors,
            sessions,
            views_per_session,
            bounce_rate,
        });
    }

    series.reverse();
    series
}

/// Turn raw grouped counts into display rows for one dimension.
///
/// Referrer rows get the heaviest treatment: non-https origins are
/// skipped outright (extension pages, androidapp schemes and the like
/// are not external links), known hostnames collapse to their canonical
/// brand name with counts merged, and the NULL group becomes the
/// "Direct / None" row. Page rows collapse full hrefs to their path.
/// Ordering is count descending with label-ascending tie-breaks, so
/// identical inputs always produce byte-identical output.
pub fn breakdown(
    dimension: Dimension,
    groups: Vec<GroupedCount>,
    referrer_names: &dyn ReferrerNames,
) -> Vec<BreakdownRow> {
    let mut merged: HashMap<String, i64> = HashMap::new();

    for group in groups {
        let label = match dimension {
            Dimension::Referrer => match group.value {
                None => Some(DIRECT_NONE.to_string()),
                Some(raw) => referrer_label(&raw, referrer_names),
            },
            Dimension::Page => group.value.as_deref().and_then(page_label),
            _ => group.value,
        };
        if let Some(label) = label {
            *merged.entry(label).or_insert(0) += group.count;
        }
    }

    let mut rows: Vec<BreakdownRow> = merged
        .into_iter()
        .map(|(label, count)| BreakdownRow { label, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    rows
}

/// Map a raw referrer value to its display label, or `None` to skip it.
fn referrer_label(raw: &str, names: &dyn ReferrerNames) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?.to_lowercase();
    match names.canonical_name(&host) {
        Some(name) => Some(name.to_string()),
        None => Some(host),
    }
}

fn page_label(href: &str) -> Option<String> {
    let parsed = Url::parse(href).ok()?;
    let path = parsed.path();
    // Hrefs with a query string keep their trailing slash through
    // canonicalization ("/path/?q=1"), so "/path/" and "/path" would
    // otherwise split into two rows. The root path stays "/".
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesight_core::enrich::UNKNOWN;
    use pagesight_core::event::{DeviceType, EventType};
    use pagesight_core::period::Period;

    struct Table;

    impl ReferrerNames for Table {
        fn canonical_name(&self, hostname: &str) -> Option<&str> {
            match hostname.trim_start_matches("www.") {
                "linkedin.com" => Some("LinkedIn"),
                "google.com" => Some("Google"),
                _ => None,
            }
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().expect("test timestamp")
    }

    fn event(created_at: &str, visitor: &str, session: &str) -> Event {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            domain_id: "dom_1".to_string(),
            event_type: EventType::PageView,
            href: "https://example.com/pricing".to_string(),
            referrer: None,
            created_at: at(created_at),
            updated_at: at(created_at),
            unique_visitor_id: Some(visitor.to_string()),
            session_id: Some(session.to_string()),
            country: UNKNOWN.to_string(),
            country_code: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
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

    fn start(session: &str, created_at: &str) -> SessionStart {
        SessionStart {
            session_id: session.to_string(),
            created_at: at(created_at),
        }
    }

    #[test]
    fn day_scenario_buckets_views_and_sessions() {
        // Three events for one visitor at 00:10, 00:40, 01:05 — gaps are
        // under 30 minutes, so a single session created at 00:10.
        let window = Period::Day.resolve(
            at("2024-03-15T00:00:00Z"),
            pagesight_core::period::default_all_time_origin(),
        );
        let events = vec![
            event("2024-03-15T00:10:00Z", "v1", "s1"),
            event("2024-03-15T00:40:00Z", "v1", "s1"),
            event("2024-03-15T01:05:00Z", "v1", "s1"),
        ];
        let starts = vec![start("s1", "2024-03-15T00:10:00Z")];

        let series = time_series(&events, &starts, &window);
        assert_eq!(series.len(), 24);
        assert_eq!(series[0].date, at("2024-03-15T00:00:00Z"));
        assert_eq!(series[0].views, 2);
        assert_eq!(series[0].sessions, 1);
        assert_eq!(series[0].unique_visitors, 1);
        assert_eq!(series[1].views, 1);
        // The session belongs to hour 0 only.
        assert_eq!(series[1].sessions, 0);
        assert_eq!(series[1].views_per_session, 0.0);
        assert!(series[2..].iter().all(|p| p.views == 0 && p.sessions == 0));
    }

    #[test]
    fn bucket_views_sum_to_the_window_total() {
        let window = Period::Day.resolve(
            at("2024-03-15T00:00:00Z"),
            pagesight_core::period::default_all_time_origin(),
        );
        let events = vec![
            event("2024-03-15T03:00:00Z", "v1", "s1"),
            event("2024-03-15T03:30:00Z", "v2", "s2"),
            event("2024-03-15T17:59:59Z", "v3", "s3"),
        ];
        let starts = vec![
            start("s1", "2024-03-15T03:00:00Z"),
            start("s2", "2024-03-15T03:30:00Z"),
            start("s3", "2024-03-15T17:59:59Z"),
        ];
        let series = time_series(&events, &starts, &window);
        let total: i64 = series.iter().map(|p| p.views).sum();
        assert_eq!(total, events.len() as i64);
    }

    #[test]
    fn ratios_are_zero_without_sessions_and_bounded_otherwise() {
        let window = Period::Day.resolve(
            at("2024-03-15T00:00:00Z"),
            pagesight_core::period::default_all_time_origin(),
        );
        let events = vec![
            event("2024-03-15T05:10:00Z", "v1", "s1"),
            event("2024-03-15T05:20:00Z", "v1", "s1"),
            event("2024-03-15T05:25:00Z", "v2", "s2"),
        ];
        let starts = vec![
            start("s1", "2024-03-15T05:10:00Z"),
            start("s2", "2024-03-15T05:25:00Z"),
        ];
        let series = time_series(&events, &starts, &window);
        for point in &series {
            assert!((0.0..=1.0).contains(&point.bounce_rate));
            assert!(point.views_per_session >= 0.0);
            if point.sessions == 0 {
                assert_eq!(point.bounce_rate, 0.0);
                assert_eq!(point.views_per_session, 0.0);
            }
        }
        // Hour 5: two sessions, s1 has two views (not a bounce), s2 one.
        assert_eq!(series[5].sessions, 2);
        assert_eq!(series[5].bounce_rate, 0.5);
        assert_eq!(series[5].views_per_session, 1.5);
    }

    #[test]
    fn series_is_chronologically_ascending() {
        let window = Period::Day.resolve(
            at("2024-03-15T00:00:00Z"),
            pagesight_core::period::default_all_time_origin(),
        );
        let series = time_series(&[], &[], &window);
        assert!(series.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn referrer_breakdown_merges_canonical_hostnames() {
        let groups = vec![
            GroupedCount {
                value: Some("https://www.linkedin.com/feed".to_string()),
                count: 3,
            },
            GroupedCount {
                value: Some("https://linkedin.com/jobs".to_string()),
                count: 2,
            },
            GroupedCount {
                value: Some("https://news.ycombinator.com/item?id=1".to_string()),
                count: 4,
            },
            GroupedCount {
                value: None,
                count: 7,
            },
        ];
        let rows = breakdown(Dimension::Referrer, groups, &Table);
        assert_eq!(
            rows,
            vec![
                BreakdownRow {
                    label: DIRECT_NONE.to_string(),
                    count: 7
                },
                BreakdownRow {
                    label: "LinkedIn".to_string(),
                    count: 5
                },
                BreakdownRow {
                    label: "news.ycombinator.com".to_string(),
                    count: 4
                },
            ]
        );
    }

    #[test]
    fn non_https_referrers_are_skipped() {
        let groups = vec![
            GroupedCount {
                value: Some("http://insecure.example/".to_string()),
                count: 9,
            },
            GroupedCount {
                value: Some("android-app://com.reddit.frontpage".to_string()),
                count: 5,
            },
            GroupedCount {
                value: Some("https://google.com/search".to_string()),
                count: 1,
            },
        ];
        let rows = breakdown(Dimension::Referrer, groups, &Table);
        assert_eq!(
            rows,
            vec![BreakdownRow {
                label: "Google".to_string(),
                count: 1
            }]
        );
    }

    #[test]
    fn page_breakdown_collapses_hrefs_to_paths() {
        let groups = vec![
            GroupedCount {
                value: Some("https://example.com/pricing".to_string()),
                count: 3,
            },
            GroupedCount {
                value: Some("https://example.com/pricing?utm_source=x".to_string()),
                count: 2,
            },
            GroupedCount {
                value: Some("https://example.com/about".to_string()),
                count: 4,
            },
        ];
        let rows = breakdown(Dimension::Page, groups, &Table);
        assert_eq!(
            rows,
            vec![
                BreakdownRow {
                    label: "/pricing".to_string(),
                    count: 5
                },
                BreakdownRow {
                    label: "/about".to_string(),
                    count: 4
                },
            ]
        );
    }

    #[test]
    fn page_breakdown_merges_trailing_slash_variants() {
        let groups = vec![
            GroupedCount {
                value: Some("https://example.com/path/?q=1".to_string()),
                count: 2,
            },
            GroupedCount {
                value: Some("https://example.com/path".to_string()),
                count: 3,
            },
            GroupedCount {
                value: Some("https://example.com/?utm_source=x".to_string()),
                count: 1,
            },
        ];
        let rows = breakdown(Dimension::Page, groups, &Table);
        assert_eq!(
            rows,
            vec![
                BreakdownRow {
                    label: "/path".to_string(),
                    count: 5
                },
                BreakdownRow {
                    label: "/".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn ties_break_by_label_for_stable_ordering() {
        let groups = vec![
            GroupedCount {
                value: Some("Linux".to_string()),
                count: 2,
            },
            GroupedCount {
                value: Some("Android".to_string()),
                count: 2,
            },
            GroupedCount {
                value: Some("macOS".to_string()),
                count: 5,
            },
        ];
        let rows = breakdown(Dimension::Os, groups, &Table);
        assert_eq!(rows[0].label, "macOS");
        assert_eq!(rows[1].label, "Android");
        assert_eq!(rows[2].label, "Linux");
    }
}
