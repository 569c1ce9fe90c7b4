use pagesight_core::enrich::BotDetector;

/// UA-signature bot classifier.
///
/// Two stateless signals: a lowercase substring scan over known crawler
/// and tooling signatures, and woothee's `crawler` category for the
/// agents it already recognizes. An empty UA is not treated as a bot —
/// plenty of privacy tooling strips the header.
#[derive(Default)]
pub struct PatternBotDetector;

const SIGNATURES: &[&str] = &[
    "bot",
    "spider",
    "crawler",
    "googlebot",
    "bingbot",
    "duckduckbot",
    "yandexbot",
    "baiduspider",
    "ahrefsbot",
    "semrushbot",
    "mj12bot",
    "facebookexternalhit",
    "headlesschrome",
    "phantomjs",
    "python-requests",
    "curl/",
    "wget/",
    "go-http-client",
    "libwww-perl",
    "urllib",
    "httpclient",
];

impl BotDetector for PatternBotDetector {
    fn is_bot(&self, user_agent: &str) -> bool {
        if user_agent.is_empty() {
            return false;
        }
        let ua = user_agent.to_ascii_lowercase();
        if SIGNATURES.iter().any(|sig| ua.contains(sig)) {
            return true;
        }
        woothee::parser::Parser::new()
            .parse(user_agent)
            .map(|result| result.category == "crawler")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawler_signatures_are_flagged() {
        let detector = PatternBotDetector;
        assert!(detector.is_bot(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        ));
        assert!(detector.is_bot("curl/8.4.0"));
        assert!(detector.is_bot("python-requests/2.31.0"));
    }

    #[test]
    fn browsers_and_empty_uas_pass() {
        let detector = PatternBotDetector;
        assert!(!detector.is_bot(
            "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0"
        ));
        assert!(!detector.is_bot(""));
    }
}
