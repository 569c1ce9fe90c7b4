use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pagesight_core::enrich::{GeoInfo, GeoLookup};

/// [`GeoLookup`] over a MaxMind GeoLite2 City database.
///
/// The database file is optional: when it is absent every lookup yields
/// `None` and events are stored with the `"Unknown"` sentinels. The
/// absence is logged once at construction, not per event.
pub struct MaxMindGeo {
    path: PathBuf,
}

impl MaxMindGeo {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "GeoIP database not found; geo fields will be Unknown");
        }
        Self { path }
    }
}

impl GeoLookup for MaxMindGeo {
    fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        if !self.path.exists() {
            return None;
        }

        let reader = maxminddb::Reader::open_readfile(&self.path).ok()?;
        let ip_addr = IpAddr::from_str(ip).ok()?;

        let record: maxminddb::geoip2::City = reader.lookup(ip_addr).ok()?;

        let country = record
            .country
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string());

        let country_code = record
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .map(|s| s.to_string());

        let region = record
            .subdivisions
            .as_ref()
            .and_then(|subs| subs.first())
            .and_then(|sub| sub.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string());

        let city = record
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string());

        let latitude = record.location.as_ref().and_then(|l| l.latitude);
        let longitude = record.location.as_ref().and_then(|l| l.longitude);

        Some(GeoInfo {
            country,
            country_code,
            region,
            city,
            latitude,
            longitude,
        })
    }
}
