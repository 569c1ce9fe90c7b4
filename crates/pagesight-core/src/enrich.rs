use crate::event::DeviceType;

/// Sentinel stored whenever an enrichment field cannot be resolved.
pub const UNKNOWN: &str = "Unknown";

/// Fixed-shape geo lookup result. Absent fields degrade to [`UNKNOWN`]
/// at ingestion; a lookup failure is never an ingestion error.
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Fixed-shape user-agent parse result. `device` always resolves to one
/// of the three device classes (Desktop when ambiguous); the remaining
/// fields stay `None` when the parser cannot supply them.
#[derive(Debug, Clone)]
pub struct UaInfo {
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub device: DeviceType,
    pub device_vendor: Option<String>,
    pub device_model: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub cpu_architecture: Option<String>,
}

impl Default for UaInfo {
    fn default() -> Self {
        Self {
            browser: None,
            browser_version: None,
            os: None,
            os_version: None,
            device: DeviceType::Desktop,
            device_vendor: None,
            device_model: None,
            engine: None,
            engine_version: None,
            cpu_architecture: None,
        }
    }
}

pub trait GeoLookup: Send + Sync {
    /// `None` when the ip cannot be resolved at all; partial results are
    /// fine and the ingestor fills the gaps with [`UNKNOWN`].
    fn lookup(&self, ip: &str) -> Option<GeoInfo>;
}

pub trait UserAgentParser: Send + Sync {
    fn parse(&self, user_agent: &str) -> UaInfo;
}

pub trait BotDetector: Send + Sync {
    fn is_bot(&self, user_agent: &str) -> bool;
}

/// Hostname → canonical display name table for the referrer breakdown
/// (e.g. `linkedin.com` and `www.linkedin.com` both → "LinkedIn"). The
/// matching policy is data, not control flow; `None` means the hostname
/// is reported as-is.
pub trait ReferrerNames: Send + Sync {
    fn canonical_name(&self, hostname: &str) -> Option<&str>;
}
