use pagesight_core::enrich::ReferrerNames;

/// Built-in hostname → brand name table for the referrer breakdown.
///
/// Matching tolerates a leading `www.`, so `www.linkedin.com` and
/// `linkedin.com` report as one row. Hostnames not in the table are
/// displayed as-is by the aggregator.
#[derive(Default)]
pub struct StaticReferrerNames;

const NAMES: &[(&str, &str)] = &[
    ("google.com", "Google"),
    ("bing.com", "Bing"),
    ("duckduckgo.com", "DuckDuckGo"),
    ("search.brave.com", "Brave Search"),
    ("yandex.com", "Yandex"),
    ("baidu.com", "Baidu"),
    ("linkedin.com", "LinkedIn"),
    ("lnkd.in", "LinkedIn"),
    ("facebook.com", "Facebook"),
    ("l.facebook.com", "Facebook"),
    ("lm.facebook.com", "Facebook"),
    ("m.facebook.com", "Facebook"),
    ("instagram.com", "Instagram"),
    ("l.instagram.com", "Instagram"),
    ("twitter.com", "X"),
    ("x.com", "X"),
    ("t.co", "X"),
    ("reddit.com", "Reddit"),
    ("out.reddit.com", "Reddit"),
    ("old.reddit.com", "Reddit"),
    ("youtube.com", "YouTube"),
    ("github.com", "GitHub"),
    ("news.ycombinator.com", "Hacker News"),
    ("producthunt.com", "Product Hunt"),
    ("medium.com", "Medium"),
    ("substack.com", "Substack"),
    ("slack.com", "Slack"),
    ("statics.teams.cdn.office.net", "Microsoft Teams"),
];

impl ReferrerNames for StaticReferrerNames {
    fn canonical_name(&self, hostname: &str) -> Option<&str> {
        let host = hostname.strip_prefix("www.").unwrap_or(hostname);
        NAMES
            .iter()
            .find(|(known, _)| *known == host)
            .map(|(_, name)| *name)
    }
}
