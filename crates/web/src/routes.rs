use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use itertools::Itertools;
use model::{is_service_included, Service};
use serde::Deserialize;
use store::{Keyspace, TierSelector};

use crate::{
    response::{ApiError, NumbersResponse, ServicesResponse},
    WebState,
};

#[derive(Debug, Default, Deserialize)]
pub struct TierQuery {
    /// `actual`, `scheduled` or `combined` (the default).
    #[serde(rename = "type")]
    pub tier: Option<String>,
    pub sort: Option<bool>,
}

fn resolve_tier(value: Option<&str>) -> Result<TierSelector, ApiError> {
    match value {
        None => Ok(TierSelector::ActualOrScheduled),
        Some(value) => TierSelector::parse(value)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown store type '{value}'"))),
    }
}

/// `GET /service/{date}` — service numbers on a date.
pub async fn service_numbers<K: Keyspace>(
    State(state): State<WebState<K>>,
    Path(servicedate): Path<String>,
    Query(query): Query<TierQuery>,
) -> Result<Json<NumbersResponse>, ApiError> {
    let selector = resolve_tier(query.tier.as_deref())?;
    let mut numbers = state.store.get_numbers(&servicedate, selector).await?;

    if query.sort.unwrap_or(false) {
        numbers = numbers.into_iter().sorted().collect();
    }

    Ok(Json(NumbersResponse { services: numbers }))
}

/// `GET /service/{date}/{number}` — all wings stored under a public number;
/// falls back to the timetable (filtered like the scheduler) on a miss.
pub async fn service_details<K: Keyspace>(
    State(state): State<WebState<K>>,
    Path((servicedate, servicenumber)): Path<(String, String)>,
    Query(query): Query<TierQuery>,
) -> Result<Json<ServicesResponse>, ApiError> {
    let selector = resolve_tier(query.tier.as_deref())?;

    if let Some(services) = state
        .store
        .get(&servicedate, &servicenumber, selector)
        .await?
    {
        return Ok(Json(ServicesResponse::from_services(&services)));
    }

    if let Some(services) = fallback_services(&state, &servicedate, &servicenumber).await? {
        return Ok(Json(ServicesResponse::from_services(&services)));
    }

    Err(ApiError::not_found("Service not found"))
}

async fn fallback_services<K: Keyspace>(
    state: &WebState<K>,
    servicedate: &str,
    servicenumber: &str,
) -> Result<Option<Vec<Service>>, ApiError> {
    let Some(iff) = &state.iff else {
        return Ok(None);
    };
    let Ok(date) = NaiveDate::parse_from_str(servicedate, "%Y-%m-%d") else {
        return Ok(None);
    };

    let Some(services) = iff.services_for_number(date, servicenumber).await? else {
        return Ok(None);
    };

    let selected: Vec<Service> = services
        .into_iter()
        .filter(|service| is_service_included(service, &state.filter))
        .collect();

    if selected.is_empty() {
        Ok(None)
    } else {
        Ok(Some(selected))
    }
}

pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Resource not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use model::{ServiceSelection, ServiceSource, ServiceStop};
    use store::{MemoryKeyspace, ServiceStore, StoreTier};
    use utility::time::parse_iso_datetime;

    fn sample_service(number: &str, service_id: &str) -> Service {
        let mut service = Service::new(
            service_id,
            NaiveDate::from_ymd_opt(2015, 4, 1).unwrap(),
            number,
        );
        service.transport_mode = Some("IC".to_owned());

        let mut stop = ServiceStop::new("ut");
        stop.servicenumber = number.to_owned();
        stop.departure_time = parse_iso_datetime("2015-04-01T12:34:00+02:00");
        stop.scheduled_departure_platform = Some("14b".to_owned());
        service.stops.push(stop);

        let mut stop = ServiceStop::new("asd");
        stop.servicenumber = number.to_owned();
        stop.arrival_time = parse_iso_datetime("2015-04-01T13:37:00+02:00");
        stop.departure_time = parse_iso_datetime("2015-04-01T13:34:00+02:00");
        service.stops.push(stop);

        let mut stop = ServiceStop::new("rtd");
        stop.servicenumber = number.to_owned();
        stop.arrival_time = parse_iso_datetime("2015-04-01T14:30:00+02:00");
        service.stops.push(stop);

        service
    }

    fn state() -> WebState<MemoryKeyspace> {
        WebState {
            store: ServiceStore::new(MemoryKeyspace::new()),
            iff: None,
            filter: ServiceSelection::default(),
        }
    }

    #[tokio::test]
    async fn numbers_listing_sorts_on_request() {
        let state = state();
        for number in ["300", "100", "200"] {
            state
                .store
                .store(&sample_service(number, number), StoreTier::Scheduled)
                .await
                .unwrap();
        }

        let Json(response) = service_numbers(
            State(state.clone()),
            Path("2015-04-01".to_owned()),
            Query(TierQuery {
                tier: None,
                sort: Some(true),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.services, vec!["100", "200", "300"]);

        let Json(response) = service_numbers(
            State(state),
            Path("2015-04-02".to_owned()),
            Query(TierQuery::default()),
        )
        .await
        .unwrap();
        assert!(response.services.is_empty());
    }

    #[tokio::test]
    async fn details_returns_the_stored_service() {
        let state = state();
        state
            .store
            .store(&sample_service("1234", "i1234"), StoreTier::Scheduled)
            .await
            .unwrap();

        let Json(response) = service_details(
            State(state),
            Path(("2015-04-01".to_owned(), "1234".to_owned())),
            Query(TierQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(response.services.len(), 1);
        let service = &response.services[0];
        assert_eq!(service.service, "1234");
        assert_eq!(service.destination.as_deref(), Some("rtd"));
        assert_eq!(service.stops.len(), 3);
        assert_eq!(service.stops[0].departure_platform.as_deref(), Some("14b"));
        assert_eq!(
            service.stops[0].departure_time.as_deref(),
            Some("2015-04-01T12:34:00+02:00")
        );
    }

    #[tokio::test]
    async fn combined_prefers_actual_and_type_selects_a_tier() {
        let state = state();
        state
            .store
            .store(
                &sample_service("1234", "unittest-scheduled"),
                StoreTier::Scheduled,
            )
            .await
            .unwrap();
        state
            .store
            .store(&sample_service("1234", "unittest-actual"), StoreTier::Actual)
            .await
            .unwrap();

        let Json(response) = service_details(
            State(state.clone()),
            Path(("2015-04-01".to_owned(), "1234".to_owned())),
            Query(TierQuery {
                tier: Some("combined".to_owned()),
                sort: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.services.len(), 1);
        assert_eq!(response.services[0].service_id, "unittest-actual");
        assert_eq!(response.services[0].source, ServiceSource::Actual);

        let Json(response) = service_details(
            State(state),
            Path(("2015-04-01".to_owned(), "1234".to_owned())),
            Query(TierQuery {
                tier: Some("scheduled".to_owned()),
                sort: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.services[0].service_id, "unittest-scheduled");
    }

    #[tokio::test]
    async fn missing_services_yield_404() {
        let error = service_details(
            State(state()),
            Path(("2015-04-01".to_owned(), "999".to_owned())),
            Query(TierQuery::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_tier_yields_400() {
        let error = service_numbers(
            State(state()),
            Path("2015-04-01".to_owned()),
            Query(TierQuery {
                tier: Some("imaginary".to_owned()),
                sort: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }
}
