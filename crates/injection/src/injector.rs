use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use config::InjectorConfig;
use model::{departure_time_window, is_service_included, Service, ServiceSelection};
use store::{Keyspace, ServiceStore};
use tokio::time::timeout;
use utility::time::TIMETABLE_TIMEZONE;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::{record::InjectionRecord, Result};

/// How long a single injection may wait for its reply.
pub const REPLY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Stop indices per service that depart inside the window and survive the
/// selection filter.
pub fn select_departures(
    services: &[Service],
    selection: &ServiceSelection,
    window_minutes: i64,
    reference: DateTime<FixedOffset>,
) -> Vec<(usize, usize)> {
    let mut departures = Vec::new();

    for (service_index, service) in services.iter().enumerate() {
        if !is_service_included(service, selection) {
            continue;
        }

        for (stop_index, stop) in service.stops.iter().enumerate() {
            if departure_time_window(stop, window_minutes, reference) {
                departures.push((service_index, stop_index));
            }
        }
    }

    departures
}

pub struct Injector<K: Keyspace> {
    store: ServiceStore<K>,
    config: InjectorConfig,
}

impl<K: Keyspace> Injector<K> {
    pub fn new(store: ServiceStore<K>, config: InjectorConfig) -> Self {
        Self { store, config }
    }

    /// One injection round: query the departure window, filter, render and
    /// dispatch. Returns the number of confirmed injections.
    pub async fn run(&self) -> Result<usize> {
        let reference = Utc::now().with_timezone(&TIMETABLE_TIMEZONE).fixed_offset();
        let until = reference + Duration::minutes(self.config.window);

        let services = self.store.services_between(reference, until).await?;
        log::debug!("Found {} services in the departure window", services.len());

        let departures =
            select_departures(&services, &self.config.selection, self.config.window, reference);
        log::info!("Found {} departures eligible for injecting", departures.len());

        if departures.is_empty() {
            return Ok(0);
        }

        self.dispatch(&services, &departures).await
    }

    async fn dispatch(
        &self,
        services: &[Service],
        departures: &[(usize, usize)],
    ) -> Result<usize> {
        let mut socket = ReqSocket::new();
        socket.connect(&self.config.injector_server).await?;

        let mut completed = 0;

        for (service_index, stop_index) in departures {
            let service = &services[*service_index];
            let Some(record) = InjectionRecord::build(service, *stop_index, self.config.max_via)
            else {
                continue;
            };

            let payload = serde_json::to_string(&record)?;
            socket.send(payload.into()).await?;

            // REQ/REP is lockstep; a missing reply leaves the socket
            // unusable, so the remainder of the batch is abandoned.
            let reply = match timeout(REPLY_TIMEOUT, socket.recv()).await {
                Err(_) => {
                    log::error!(
                        "No reply within {}s, aborting batch after {completed} injections",
                        REPLY_TIMEOUT.as_secs()
                    );
                    break;
                }
                Ok(Err(why)) => {
                    log::error!(
                        "Transport error while injecting, aborting batch after {completed} injections: {why}"
                    );
                    break;
                }
                Ok(Ok(reply)) => reply,
            };

            if reply_confirms(&reply) {
                completed += 1;
                log::debug!(
                    "Injected service {} at {}",
                    record.service_number,
                    record.stop_code
                );
            } else {
                log::error!(
                    "Injection of service {} at {} was not accepted",
                    record.service_number,
                    record.stop_code
                );
            }
        }

        // Pending data is discarded on close.
        socket.close().await;
        Ok(completed)
    }
}

fn reply_confirms(reply: &ZmqMessage) -> bool {
    let Some(frame) = reply.get(0) else {
        return false;
    };

    match serde_json::from_slice::<serde_json::Value>(frame) {
        Ok(value) => value
            .get("result")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::{ServiceFilter, ServiceStop};
    use utility::time::parse_iso_datetime;

    fn service_with_departures(number: &str, departures: &[&str]) -> Service {
        let mut service =
            Service::new(number, NaiveDate::from_ymd_opt(2015, 4, 1).unwrap(), number);
        service.company_code = Some("NS".to_owned());

        for (index, departure) in departures.iter().enumerate() {
            let mut stop = ServiceStop::new(&format!("s{index}"));
            stop.departure_time = parse_iso_datetime(departure);
            service.stops.push(stop);
        }

        let mut terminus = ServiceStop::new("end");
        terminus.arrival_time = parse_iso_datetime("2015-04-01T23:00:00+02:00");
        service.stops.push(terminus);

        service
    }

    #[test]
    fn selects_only_stops_inside_the_window() {
        let reference = parse_iso_datetime("2015-04-01T12:00:00+02:00").unwrap();
        let services = vec![service_with_departures(
            "100",
            &[
                "2015-04-01T11:30:00+02:00", // already departed
                "2015-04-01T12:10:00+02:00", // inside
                "2015-04-01T13:30:00+02:00", // beyond the window
            ],
        )];

        let departures = select_departures(&services, &ServiceSelection::default(), 30, reference);
        assert_eq!(departures, vec![(0, 1)]);
    }

    #[test]
    fn selection_filter_applies_before_the_window() {
        let reference = parse_iso_datetime("2015-04-01T12:00:00+02:00").unwrap();
        let services = vec![
            service_with_departures("100", &["2015-04-01T12:10:00+02:00"]),
            service_with_departures("9100", &["2015-04-01T12:15:00+02:00"]),
        ];

        let selection = ServiceSelection {
            include: None,
            exclude: Some(ServiceFilter {
                service: vec![(9000, 9999)],
                ..ServiceFilter::default()
            }),
        };

        let departures = select_departures(&services, &selection, 30, reference);
        assert_eq!(departures, vec![(0, 0)]);
    }

    #[test]
    fn reply_parsing() {
        let reply = |body: &str| ZmqMessage::from(body.to_owned());

        assert!(reply_confirms(&reply("{\"result\": true}")));
        assert!(!reply_confirms(&reply("{\"result\": false}")));
        assert!(!reply_confirms(&reply("{\"outcome\": true}")));
        assert!(!reply_confirms(&reply("not json")));
    }
}
