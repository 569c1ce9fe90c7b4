use serde::Deserialize;

use crate::error::EngineError;

/// The sentinel the dashboard sends to mean "no referrer" — direct
/// traffic. Compiles to an IS NULL check rather than a string match.
pub const DIRECT_NONE: &str = "Direct / None";

/// Declarative filters a caller may attach to any statistics query.
/// Every field is independently optional; present fields AND-combine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSet {
    pub referrer: Option<String>,
    pub page: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device: Option<String>,
}

/// One compiled storage condition. The store decides how to evaluate
/// these (the DuckDB backend renders parameterized WHERE clauses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    ReferrerIsNull,
    ReferrerStartsWith(String),
    HrefEquals(String),
    CountryEquals(String),
    RegionEquals(String),
    CityEquals(String),
    BrowserEquals(String),
    OsEquals(String),
    DeviceEquals(String),
    ExcludeBots,
}

/// An opaque, AND-combined condition list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

/// Compile a filter set against a domain into a storage predicate.
///
/// Rules:
/// - referrer: the [`DIRECT_NONE`] sentinel means IS NULL; any other
///   value is a prefix match, so a bare hostname filter still catches
///   full referrer URLs.
/// - page: the value is a path, matched exactly against the canonical
///   `https://{domain}{page}` href. A value without a leading `/` is a
///   validation error, not a silent mismatch.
/// - geography is hierarchical and exclusive by specificity: city beats
///   region beats country; levels are never combined.
/// - browser / os / device: exact matches.
///
/// Bot exclusion is not part of compilation — the aggregator appends it
/// unconditionally.
pub fn compile(domain: &str, filters: &FilterSet) -> Result<Predicate, EngineError> {
    let mut predicate = Predicate::default();

    if let Some(referrer) = &filters.referrer {
        if referrer == DIRECT_NONE {
            predicate.push(Condition::ReferrerIsNull);
        } else {
            predicate.push(Condition::ReferrerStartsWith(referrer.clone()));
        }
    }

    if let Some(page) = &filters.page {
        if !page.starts_with('/') {
            return Err(EngineError::validation(format!(
                "page filter must be a path starting with '/': {page:?}"
            )));
        }
        // Same canonical form the ingestor stores: no trailing slash.
        let href = format!("https://{domain}{page}");
        let href = href.strip_suffix('/').unwrap_or(&href).to_string();
        predicate.push(Condition::HrefEquals(href));
    }

    if let Some(city) = &filters.city {
        predicate.push(Condition::CityEquals(city.clone()));
    } else if let Some(region) = &filters.region {
        predicate.push(Condition::RegionEquals(region.clone()));
    } else if let Some(country) = &filters.country {
        predicate.push(Condition::CountryEquals(country.clone()));
    }

    if let Some(browser) = &filters.browser {
        predicate.push(Condition::BrowserEquals(browser.clone()));
    }
    if let Some(os) = &filters.os {
        predicate.push(Condition::OsEquals(os.clone()));
    }
    if let Some(device) = &filters.device {
        predicate.push(Condition::DeviceEquals(device.clone()));
    }

    Ok(predicate)
}
