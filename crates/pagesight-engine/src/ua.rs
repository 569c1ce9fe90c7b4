use pagesight_core::enrich::{UaInfo, UserAgentParser};

use crate::ingest::classify_device;

/// [`UserAgentParser`] backed by `woothee`. An empty or unclassifiable
/// UA string degrades to the default info (everything Unknown, device
/// Desktop) rather than failing ingestion.
#[derive(Default)]
pub struct WootheeParser;

impl UserAgentParser for WootheeParser {
    fn parse(&self, user_agent: &str) -> UaInfo {
        if user_agent.is_empty() {
            return UaInfo::default();
        }
        let Some(result) = woothee::parser::Parser::new().parse(user_agent) else {
            return UaInfo::default();
        };

        // woothee reports unknowns as "UNKNOWN" or empty strings.
        UaInfo {
            browser: non_empty(result.name),
            browser_version: non_empty(&result.version),
            os: non_empty(result.os),
            os_version: non_empty(&result.os_version),
            device: classify_device(Some(result.category)),
            device_vendor: non_empty(result.vendor),
            device_model: None,
            engine: None,
            engine_version: None,
            cpu_architecture: None,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesight_core::event::DeviceType;

    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

    #[test]
    fn desktop_browser_is_classified() {
        let ua = WootheeParser.parse(FIREFOX_LINUX);
        assert_eq!(ua.browser.as_deref(), Some("Firefox"));
        assert_eq!(ua.os.as_deref(), Some("Linux"));
        assert_eq!(ua.device, DeviceType::Desktop);
    }

    #[test]
    fn iphone_is_mobile() {
        let ua = WootheeParser.parse(SAFARI_IPHONE);
        assert_eq!(ua.device, DeviceType::Mobile);
    }

    #[test]
    fn empty_ua_degrades_to_defaults() {
        let ua = WootheeParser.parse("");
        assert!(ua.browser.is_none());
        assert!(ua.os.is_none());
        assert_eq!(ua.device, DeviceType::Desktop);
    }
}
