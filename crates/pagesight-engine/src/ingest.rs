use url::Url;

use pagesight_core::enrich::{GeoInfo, UaInfo, UNKNOWN};
use pagesight_core::error::EngineError;
use pagesight_core::event::{DeviceType, Event, EventType, RawPageView, RequestMeta};

/// The parts of an href the ingestor needs: the canonical form, the host
/// for the cross-site guard, and the UTM parameters.
#[derive(Debug, Clone)]
pub(crate) struct CanonicalHref {
    pub href: String,
    pub host: String,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

/// Canonicalize an incoming href. An unparsable or host-less URL is a
/// hard failure — the event is rejected, not silently dropped.
pub(crate) fn canonicalize_href(raw: &str) -> Result<CanonicalHref, EngineError> {
    let parsed =
        Url::parse(raw).map_err(|e| EngineError::validation(format!("invalid href {raw:?}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| EngineError::validation(format!("href has no host: {raw:?}")))?
        .to_lowercase();

    let mut utm_source = None;
    let mut utm_medium = None;
    let mut utm_campaign = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "utm_source" => utm_source = Some(value.into_owned()),
            "utm_medium" => utm_medium = Some(value.into_owned()),
            "utm_campaign" => utm_campaign = Some(value.into_owned()),
            _ => {}
        }
    }

    let href = parsed.to_string();
    let href = href.strip_suffix('/').unwrap_or(&href).to_string();

    Ok(CanonicalHref {
        href,
        host,
        utm_source,
        utm_medium,
        utm_campaign,
    })
}

fn unknown_or(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

/// Assemble the enriched event from the canonical href, the collaborator
/// results, and the derived visitor id. Geo and UA gaps become the
/// `"Unknown"` sentinel; only direct-traffic referrer stays NULL.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_event(
    raw: &RawPageView,
    _meta: &RequestMeta,
    domain_id: &str,
    canonical: CanonicalHref,
    geo: GeoInfo,
    ua: UaInfo,
    visitor_id: String,
    bot: bool,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Event {
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        domain_id: domain_id.to_string(),
        event_type: EventType::PageView,
        href: canonical.href,
        referrer: raw.referrer.clone(),
        created_at,
        updated_at: created_at,
        unique_visitor_id: Some(visitor_id),
        session_id: None,
        country: unknown_or(geo.country),
        country_code: unknown_or(geo.country_code),
        region: unknown_or(geo.region),
        city: unknown_or(geo.city),
        latitude: geo
            .latitude
            .map(|v| v.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        longitude: geo
            .longitude
            .map(|v| v.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        browser: unknown_or(ua.browser),
        browser_version: unknown_or(ua.browser_version),
        os: unknown_or(ua.os),
        os_version: unknown_or(ua.os_version),
        device: ua.device,
        device_vendor: unknown_or(ua.device_vendor),
        device_model: unknown_or(ua.device_model),
        engine: unknown_or(ua.engine),
        engine_version: unknown_or(ua.engine_version),
        cpu_architecture: unknown_or(ua.cpu_architecture),
        bot,
        utm_source: canonical.utm_source,
        utm_medium: canonical.utm_medium,
        utm_campaign: canonical.utm_campaign,
    }
}

/// Device classification falls back to Desktop whenever the parser is
/// unsure; the three classes are exhaustive by contract.
pub(crate) fn classify_device(category: Option<&str>) -> DeviceType {
    match category {
        Some("smartphone") | Some("mobilephone") => DeviceType::Mobile,
        Some("tablet") => DeviceType::Tablet,
        _ => DeviceType::Desktop,
    }
}
