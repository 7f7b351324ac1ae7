//! Inclusion and exclusion predicates over services and stops, driven by
//! the `scheduler.filter` and `injector.selection` configuration sections.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Deserialize;

use crate::service::{Service, ServiceSource, ServiceStop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreSelector {
    Actual,
    Scheduled,
    Any,
}

/// A single filter: any non-empty key that matches makes the whole filter
/// match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceFilter {
    #[serde(default)]
    pub company: Vec<String>,
    /// Closed numeric service number ranges.
    #[serde(default)]
    pub service: Vec<(i64, i64)>,
    #[serde(default)]
    pub transport_mode: Vec<String>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub store: Option<StoreSelector>,
}

/// Whitelist/blacklist pair: the whitelist overrides the blacklist.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceSelection {
    #[serde(default)]
    pub include: Option<ServiceFilter>,
    #[serde(default)]
    pub exclude: Option<ServiceFilter>,
}

/// Returns true when the service matches one or more filter conditions.
pub fn match_filter(service: &Service, filter: &ServiceFilter) -> bool {
    if !filter.company.is_empty() {
        if let Some(company) = &service.company_code {
            if contains_ignore_case(&filter.company, company) {
                return true;
            }
        }
    }

    if !filter.service.is_empty() {
        if let Ok(number) = service.servicenumber.parse::<i64>() {
            if filter
                .service
                .iter()
                .any(|(low, high)| number >= *low && number <= *high)
            {
                return true;
            }
        }
    }

    if !filter.transport_mode.is_empty() {
        if let Some(mode) = &service.transport_mode {
            if contains_ignore_case(&filter.transport_mode, mode) {
                return true;
            }
        }
    }

    if !filter.stop.is_empty()
        && service
            .stops
            .iter()
            .any(|stop| contains_ignore_case(&filter.stop, &stop.stop_code))
    {
        return true;
    }

    if let Some(selector) = filter.store {
        let matched = match selector {
            StoreSelector::Any => true,
            StoreSelector::Actual => service.source == ServiceSource::Actual,
            StoreSelector::Scheduled => service.source == ServiceSource::Scheduled,
        };
        if matched {
            return true;
        }
    }

    false
}

/// A service passes when the exclusion filter does not match, or when the
/// inclusion filter matches it back in.
pub fn is_service_included(service: &Service, selection: &ServiceSelection) -> bool {
    let excluded = selection
        .exclude
        .as_ref()
        .is_some_and(|filter| match_filter(service, filter));

    if !excluded {
        return true;
    }

    selection
        .include
        .as_ref()
        .is_some_and(|filter| match_filter(service, filter))
}

/// True when the stop departs (including its delay) inside
/// `[reference, reference + minutes)`. Stops that already departed never
/// match.
pub fn departure_time_window(
    stop: &ServiceStop,
    minutes: i64,
    reference: DateTime<FixedOffset>,
) -> bool {
    let Some(departure) = stop.departure_time else {
        return false;
    };

    let effective = departure + Duration::minutes(stop.departure_delay);
    effective >= reference && effective < reference + Duration::minutes(minutes)
}

fn contains_ignore_case(haystack: &[String], needle: &str) -> bool {
    haystack
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(needle))
}
