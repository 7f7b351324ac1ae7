use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Which layer of the schedule store a record was read from. `Iff` marks
/// services hydrated directly from the timetable database, bypassing the
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceSource {
    Scheduled,
    Actual,
    Iff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeProcessing {
    BoardingOnly,
    UnboardingOnly,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub code: String,
    pub description: String,
    pub processing_code: AttributeProcessing,
}

impl Attribute {
    pub fn new(code: &str, description: &str, processing_code: AttributeProcessing) -> Self {
        Self {
            code: code.to_owned(),
            description: description.to_owned(),
            processing_code,
        }
    }
}

/// A single logical run of a train on a service date. Wings that split or
/// join produce several `Service` values sharing one stop list, each under
/// its own public service number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service_id: String,
    pub service_date: NaiveDate,
    pub servicenumber: String,
    #[serde(default)]
    pub company_code: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub transport_mode_description: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    pub stops: Vec<ServiceStop>,
    pub source: ServiceSource,
}

impl Service {
    pub fn new(service_id: &str, service_date: NaiveDate, servicenumber: &str) -> Self {
        Self {
            service_id: service_id.to_owned(),
            service_date,
            servicenumber: servicenumber.to_owned(),
            company_code: None,
            company_name: None,
            transport_mode: None,
            transport_mode_description: None,
            cancelled: false,
            stops: Vec::new(),
            source: ServiceSource::Scheduled,
        }
    }

    /// Service date as `YYYY-MM-DD`.
    pub fn servicedate_str(&self) -> String {
        self.service_date.format("%Y-%m-%d").to_string()
    }

    pub fn departure(&self) -> Option<&ServiceStop> {
        self.stops.first()
    }

    pub fn departure_str(&self) -> Option<&str> {
        self.departure().map(|stop| stop.stop_code.as_str())
    }

    pub fn destination(&self) -> Option<&ServiceStop> {
        self.stops.last()
    }

    pub fn destination_str(&self) -> Option<&str> {
        self.destination().map(|stop| stop.stop_code.as_str())
    }

    /// Departure time of the first stop.
    pub fn first_departure(&self) -> Option<DateTime<FixedOffset>> {
        self.stops.iter().find_map(|stop| stop.departure_time)
    }

    /// Arrival time of the last stop.
    pub fn last_arrival(&self) -> Option<DateTime<FixedOffset>> {
        self.stops.iter().rev().find_map(|stop| stop.arrival_time)
    }

    /// A service counts as cancelled when no stop departs: every stop has a
    /// cancelled departure, except the terminal stop which only needs its
    /// arrival cancelled.
    pub fn derive_cancelled(&self) -> bool {
        if self.stops.is_empty() {
            return false;
        }

        self.stops.iter().enumerate().all(|(index, stop)| {
            if index == self.stops.len() - 1 {
                stop.cancelled_arrival
            } else {
                stop.cancelled_departure
            }
        })
    }

    /// Whether any single stop lost its arrival or departure.
    pub fn partly_cancelled(&self) -> bool {
        self.stops
            .iter()
            .any(|stop| stop.cancelled_arrival || stop.cancelled_departure)
    }

    /// Largest arrival or departure delay over all stops, in minutes.
    pub fn max_delay(&self) -> i64 {
        self.stops
            .iter()
            .map(|stop| stop.arrival_delay.max(stop.departure_delay))
            .max()
            .unwrap_or(0)
    }
}

/// One stop event on a service's path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStop {
    pub stop_code: String,
    #[serde(default)]
    pub stop_name: Option<String>,
    /// Service number in effect at this stop; differs from the parent
    /// service's number where wings split.
    #[serde(default)]
    pub servicenumber: String,
    #[serde(default)]
    pub arrival_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub departure_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub scheduled_arrival_platform: Option<String>,
    #[serde(default)]
    pub actual_arrival_platform: Option<String>,
    #[serde(default)]
    pub scheduled_departure_platform: Option<String>,
    #[serde(default)]
    pub actual_departure_platform: Option<String>,
    #[serde(default)]
    pub arrival_delay: i64,
    #[serde(default)]
    pub departure_delay: i64,
    #[serde(default)]
    pub cancelled_arrival: bool,
    #[serde(default)]
    pub cancelled_departure: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl ServiceStop {
    pub fn new(stop_code: &str) -> Self {
        Self {
            stop_code: stop_code.to_lowercase(),
            stop_name: None,
            servicenumber: String::new(),
            arrival_time: None,
            departure_time: None,
            scheduled_arrival_platform: None,
            actual_arrival_platform: None,
            scheduled_departure_platform: None,
            actual_departure_platform: None,
            arrival_delay: 0,
            departure_delay: 0,
            cancelled_arrival: false,
            cancelled_departure: false,
            attributes: Vec::new(),
        }
    }

    /// Actual platform when known, scheduled otherwise.
    pub fn departure_platform(&self) -> Option<&str> {
        self.actual_departure_platform
            .as_deref()
            .or(self.scheduled_departure_platform.as_deref())
    }

    pub fn arrival_platform(&self) -> Option<&str> {
        self.actual_arrival_platform
            .as_deref()
            .or(self.scheduled_arrival_platform.as_deref())
    }

    /// Stops without any time never persist.
    pub fn has_time(&self) -> bool {
        self.arrival_time.is_some() || self.departure_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utility::time::parse_iso_datetime;

    fn sample_service() -> Service {
        let mut service =
            Service::new("i1234", NaiveDate::from_ymd_opt(2015, 4, 1).unwrap(), "1234");

        let mut ut = ServiceStop::new("UT");
        ut.stop_name = Some("Utrecht Centraal".to_owned());
        ut.departure_time = parse_iso_datetime("2015-04-01T12:34:00+02:00");
        ut.scheduled_departure_platform = Some("5a".to_owned());
        ut.actual_departure_platform = Some("5b".to_owned());
        service.stops.push(ut);

        let mut asd = ServiceStop::new("asd");
        asd.stop_name = Some("Amsterdam Centraal".to_owned());
        asd.arrival_time = parse_iso_datetime("2015-04-01T13:37:00+02:00");
        asd.departure_time = parse_iso_datetime("2015-04-01T13:34:00+02:00");
        asd.departure_delay = 5;
        service.stops.push(asd);

        let mut rtd = ServiceStop::new("rtd");
        rtd.stop_name = Some("Rotterdam Centraal".to_owned());
        rtd.arrival_time = parse_iso_datetime("2015-04-01T14:30:00+02:00");
        rtd.scheduled_arrival_platform = Some("15b".to_owned());
        service.stops.push(rtd);

        service
    }

    #[test]
    fn derived_accessors() {
        let service = sample_service();

        assert_eq!(service.servicedate_str(), "2015-04-01");
        assert_eq!(service.departure_str(), Some("ut"));
        assert_eq!(service.destination_str(), Some("rtd"));
        assert_eq!(
            service.first_departure(),
            parse_iso_datetime("2015-04-01T12:34:00+02:00")
        );
        assert_eq!(
            service.last_arrival(),
            parse_iso_datetime("2015-04-01T14:30:00+02:00")
        );
        assert_eq!(service.max_delay(), 5);
        assert!(!service.partly_cancelled());
    }

    #[test]
    fn stop_codes_are_lowercased() {
        assert_eq!(ServiceStop::new("UT").stop_code, "ut");
    }

    #[test]
    fn effective_platform_prefers_actual() {
        let service = sample_service();
        assert_eq!(service.stops[0].departure_platform(), Some("5b"));
        assert_eq!(service.stops[2].arrival_platform(), Some("15b"));
        assert_eq!(service.stops[2].departure_platform(), None);
    }

    #[test]
    fn cancellation_derivation() {
        let mut service = sample_service();
        assert!(!service.derive_cancelled());

        for stop in &mut service.stops {
            stop.cancelled_departure = true;
        }
        // Terminal stop still arrives.
        assert!(!service.derive_cancelled());
        assert!(service.partly_cancelled());

        service.stops.last_mut().unwrap().cancelled_arrival = true;
        assert!(service.derive_cancelled());
    }

    #[test]
    fn each_service_owns_its_stops() {
        let original = sample_service();
        let mut copy = original.clone();
        copy.stops.clear();

        assert_eq!(original.stops.len(), 3);
        assert!(copy.stops.is_empty());
    }

    #[test]
    fn json_round_trip() {
        let service = sample_service();
        let encoded = serde_json::to_string(&service).unwrap();
        let decoded: Service = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, service);
    }
}
