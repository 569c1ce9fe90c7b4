use chrono::{DateTime, Utc};

use crate::period::default_all_time_origin;

/// Runtime configuration, read once from the environment by the
/// embedding process.
#[derive(Debug, Clone)]
pub struct Config {
    /// DuckDB database file path.
    pub db_path: String,
    /// MaxMind City database path; geo enrichment degrades to Unknown
    /// sentinels when the file is absent.
    pub geoip_path: String,
    /// Session inactivity window. The product default is 30 minutes;
    /// this is configurable for tests and ops, not exposed to users.
    pub session_window_minutes: u32,
    /// `from` bound used by "all time" reporting windows.
    pub all_time_origin: DateTime<Utc>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            db_path: std::env::var("PAGESIGHT_DB_PATH")
                .unwrap_or_else(|_| "./pagesight.db".to_string()),
            geoip_path: std::env::var("PAGESIGHT_GEOIP_PATH")
                .unwrap_or_else(|_| "./GeoLite2-City.mmdb".to_string()),
            session_window_minutes: std::env::var("PAGESIGHT_SESSION_WINDOW_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|e| format!("invalid session window: {e}"))?,
            all_time_origin: match std::env::var("PAGESIGHT_ALL_TIME_ORIGIN") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|e| format!("invalid all-time origin: {e}"))?,
                Err(_) => default_all_time_origin(),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./pagesight.db".to_string(),
            geoip_path: "./GeoLite2-City.mmdb".to_string(),
            session_window_minutes: 30,
            all_time_origin: default_all_time_origin(),
        }
    }
}
