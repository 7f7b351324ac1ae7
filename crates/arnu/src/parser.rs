use std::collections::HashSet;

use indexmap::IndexSet;
use model::{Service, ServiceSource, ServiceStop};
use utility::time::{get_service_date, parse_iso_datetime, parse_iso_delay};

use crate::message::{Envelope, ServiceInfo, Stop};
use crate::{ArnuError, ReferenceData, Result};

/// What the store should do with a parsed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Store,
    Remove,
}

/// Parses one envelope into `(service, action)` pairs. A document that is
/// not valid XML fails as a whole; a malformed service info inside a valid
/// envelope is skipped with an error report.
pub async fn parse_message<R>(document: &str, reference: &R) -> Result<Vec<(Service, Action)>>
where
    R: ReferenceData + ?Sized,
{
    let envelope: Envelope =
        serde_xml_rs::from_str(document).map_err(|why| ArnuError::Xml(why.to_string()))?;

    let mut services = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for item in &envelope.service_info_list.items {
        match parse_service_info(item, reference).await {
            Ok(parsed) => {
                for (service, action) in parsed {
                    // Skip duplicates within the envelope.
                    if seen.insert(service.service_id.clone()) {
                        services.push((service, action));
                    }
                }
            }
            Err(ArnuError::MalformedService(why)) => {
                log::error!("Skipping service info: {why}");
            }
            Err(other) => return Err(other),
        }
    }

    Ok(services)
}

async fn parse_service_info<R>(
    item: &ServiceInfo,
    reference: &R,
) -> Result<Vec<(Service, Action)>>
where
    R: ReferenceData + ?Sized,
{
    let service_code = item
        .service_code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ArnuError::MalformedService("missing ServiceCode".to_owned()))?;

    let stop_items = item
        .stop_list
        .as_ref()
        .map(|list| list.stops.as_slice())
        .unwrap_or_default();
    if stop_items.is_empty() {
        return Err(ArnuError::MalformedService(format!(
            "service {service_code} has no stops"
        )));
    }

    // The operational day follows from the first stop's departure, which may
    // itself be cancelled.
    let first_departure = stop_items[0]
        .departure
        .as_deref()
        .and_then(parse_iso_datetime)
        .ok_or_else(|| {
            ArnuError::MalformedService(format!(
                "service {service_code} has no departure time on its first stop"
            ))
        })?;
    let service_date = get_service_date(first_departure);

    let transport_mode_description = match item.transport_mode_code.as_deref() {
        Some(code) => reference
            .transport_mode(code)
            .await
            .map_err(ArnuError::Reference)?,
        None => None,
    };
    let company_name = match item.company_code.as_deref() {
        Some(code) => reference
            .company_name(code)
            .await
            .map_err(ArnuError::Reference)?,
        None => None,
    };

    let mut servicenumbers: IndexSet<String> = IndexSet::new();
    let mut stops = Vec::with_capacity(stop_items.len());
    let mut previous_departure_cancelled = false;

    for stop_item in stop_items {
        let stop_code = stop_item
            .stop_code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                ArnuError::MalformedService(format!(
                    "service {service_code} has a stop without StopCode"
                ))
            })?;

        let servicenumber = stop_item
            .stop_service_code
            .clone()
            .filter(|number| !number.is_empty())
            .unwrap_or_else(|| format!("i{service_code}"));
        servicenumbers.insert(servicenumber.clone());

        let mut stop = ServiceStop::new(stop_code);
        stop.servicenumber = servicenumber;
        stop.stop_name = reference
            .station_name(&stop.stop_code)
            .await
            .map_err(ArnuError::Reference)?;
        stop.arrival_time = stop_item.arrival.as_deref().and_then(parse_iso_datetime);
        stop.departure_time = stop_item.departure.as_deref().and_then(parse_iso_datetime);
        stop.arrival_delay = stop_item
            .arrival_time_delay
            .as_deref()
            .map(parse_iso_delay)
            .unwrap_or(0);
        stop.departure_delay = stop_item
            .departure_time_delay
            .as_deref()
            .map(parse_iso_delay)
            .unwrap_or(0);
        stop.scheduled_arrival_platform = stop_item.arrival_platform.clone();
        stop.actual_arrival_platform = stop_item.actual_arrival_platform.clone();
        stop.scheduled_departure_platform = stop_item.departure_platform.clone();
        stop.actual_departure_platform = stop_item.actual_departure_platform.clone();

        // A cancelled or diverted stop loses both its arrival and its
        // departure; the cancelled departure carries into the next stop's
        // arrival, where a normal stop then clears the carry.
        let cancelled = is_cancelled_stop(stop_item);
        if cancelled {
            log::debug!(
                "Cancelled stop {} for service {service_code}",
                stop.stop_code
            );
        }
        stop.cancelled_arrival = cancelled || previous_departure_cancelled;
        stop.cancelled_departure = cancelled;
        previous_departure_cancelled = cancelled;

        stops.push(stop);
    }

    let service_cancelled = is_fully_cancelled(&stops);
    let remove_requested = item
        .service_type
        .as_deref()
        .map(str::trim)
        .is_some_and(|value| {
            value.eq_ignore_ascii_case("remove") || value.eq_ignore_ascii_case("cancel")
        });

    // A fully-cancelled service is still displayed unless the message
    // explicitly asks for removal.
    let action = if service_cancelled && remove_requested {
        Action::Remove
    } else {
        Action::Store
    };

    let first_stop = &stops[0].stop_code;
    let last_stop = &stops[stops.len() - 1].stop_code;

    let mut services = Vec::with_capacity(servicenumbers.len());
    for servicenumber in &servicenumbers {
        let service_id = format!("{servicenumber}-{first_stop}-{last_stop}");
        let mut service = Service::new(&service_id, service_date, servicenumber);
        service.company_code = item.company_code.clone();
        service.company_name = company_name.clone();
        service.transport_mode = item.transport_mode_code.clone();
        service.transport_mode_description = transport_mode_description.clone();
        service.cancelled = service_cancelled;
        service.stops = stops.clone();
        service.source = ServiceSource::Actual;
        services.push((service, action));
    }

    Ok(services)
}

fn is_cancelled_stop(stop: &Stop) -> bool {
    matches!(
        stop.stop_type.as_deref(),
        Some("Cancelled-Stop") | Some("Diverted-Stop")
    )
}

fn is_fully_cancelled(stops: &[ServiceStop]) -> bool {
    stops.iter().enumerate().all(|(index, stop)| {
        if index == stops.len() - 1 {
            stop.cancelled_arrival
        } else {
            stop.cancelled_departure
        }
    })
}
