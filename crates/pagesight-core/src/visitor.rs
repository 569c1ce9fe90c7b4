use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Derive the pseudonymous visitor identifier for one request.
///
/// Formula: hex(HMAC-SHA256(key = UTC day of `as_of` as `YYYY-MM-DD`,
/// message = `"{domain}-{ip}-{user_agent}"`)).
///
/// The day-derived key makes the id stable within one UTC day and
/// unlinkable across days without ever storing the raw IP or UA. Callers
/// pass the *event's* timestamp, never wall-clock now, so replayed events
/// hash identically. `domain` must already be lowercase.
///
/// Known limitation, carried deliberately: a visitor active across
/// midnight UTC becomes a new visitor, which also opens a new session.
pub fn derive(domain: &str, ip: &str, user_agent: &str, as_of: DateTime<Utc>) -> String {
    let day_key = as_of.format("%Y-%m-%d").to_string();
    // HMAC accepts keys of any length; new_from_slice cannot fail.
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(day_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{domain}-{ip}-{user_agent}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
