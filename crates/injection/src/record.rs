use model::{AttributeProcessing, Service};
use serde::{Deserialize, Serialize};
use utility::time::datetime_to_iso;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopReference {
    pub code: String,
    pub name: Option<String>,
}

/// One departure, rendered for the receiving passenger-information system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionRecord {
    pub service_id: String,
    pub service_number: String,
    pub service_date: String,
    pub destination_code: Option<String>,
    pub destination_text: Option<String>,
    pub do_not_board: bool,
    pub transmode_code: Option<String>,
    pub transmode_text: Option<String>,
    pub company: Option<String>,
    pub departure: Option<String>,
    pub stop_code: String,
    pub platform: Option<String>,
    /// The next few stops, excluding the destination.
    pub via: Vec<StopReference>,
    /// Every stop after the current one, destination included.
    pub stops: Vec<StopReference>,
    pub arrival_delay: i64,
    pub departure_delay: i64,
}

impl InjectionRecord {
    /// Renders the departure at `stop_index` of a service. Returns `None`
    /// for an out-of-range index.
    pub fn build(service: &Service, stop_index: usize, max_via: usize) -> Option<Self> {
        let stop = service.stops.get(stop_index)?;
        let destination = service.destination();

        let upcoming: Vec<StopReference> = service.stops[stop_index + 1..]
            .iter()
            .map(|upcoming_stop| StopReference {
                code: upcoming_stop.stop_code.clone(),
                name: upcoming_stop.stop_name.clone(),
            })
            .collect();

        let destination_code = destination.map(|destination| destination.stop_code.clone());
        let via = upcoming
            .iter()
            .filter(|reference| Some(&reference.code) != destination_code.as_ref())
            .take(max_via)
            .cloned()
            .collect();

        let service_number = if stop.servicenumber.is_empty() {
            service.servicenumber.clone()
        } else {
            stop.servicenumber.clone()
        };

        let do_not_board = stop
            .attributes
            .iter()
            .any(|attribute| attribute.processing_code == AttributeProcessing::UnboardingOnly);

        Some(Self {
            service_id: service.service_id.clone(),
            service_number,
            service_date: service.servicedate_str(),
            destination_code,
            destination_text: destination.and_then(|destination| destination.stop_name.clone()),
            do_not_board,
            transmode_code: service.transport_mode.clone(),
            transmode_text: service.transport_mode_description.clone(),
            company: service.company_name.clone(),
            departure: datetime_to_iso(stop.departure_time),
            stop_code: stop.stop_code.clone(),
            platform: stop.departure_platform().map(str::to_owned),
            via,
            stops: upcoming,
            arrival_delay: stop.arrival_delay,
            departure_delay: stop.departure_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::{Attribute, ServiceStop};
    use utility::time::parse_iso_datetime;

    fn prepare_service(number: &str) -> Service {
        // The internal id deliberately differs from the public number.
        let mut service = Service::new(
            &format!("i{number}"),
            NaiveDate::from_ymd_opt(2015, 4, 1).unwrap(),
            number,
        );
        service.transport_mode = Some("IC".to_owned());
        service.transport_mode_description = Some("Intercity".to_owned());
        service.company_name = Some("Nederlandse Spoorwegen".to_owned());

        let mut stop = ServiceStop::new("ut");
        stop.servicenumber = number.to_owned();
        stop.stop_name = Some("Utrecht Centraal".to_owned());
        stop.departure_time = parse_iso_datetime("2015-04-01T12:34:00+02:00");
        stop.scheduled_departure_platform = Some("5a".to_owned());
        stop.actual_departure_platform = Some("5b".to_owned());
        service.stops.push(stop);

        let mut stop = ServiceStop::new("asd");
        stop.servicenumber = number.to_owned();
        stop.stop_name = Some("Amsterdam Centraal".to_owned());
        stop.arrival_time = parse_iso_datetime("2015-04-01T13:37:00+02:00");
        stop.departure_time = parse_iso_datetime("2015-04-01T13:34:00+02:00");
        service.stops.push(stop);

        let mut stop = ServiceStop::new("rtd");
        stop.servicenumber = number.to_owned();
        stop.stop_name = Some("Rotterdam Centraal".to_owned());
        stop.arrival_time = parse_iso_datetime("2015-04-01T14:30:00+02:00");
        service.stops.push(stop);

        service
    }

    fn numbered_stops(count: usize) -> Service {
        let mut service =
            Service::new("i123", NaiveDate::from_ymd_opt(2015, 4, 1).unwrap(), "123");
        for index in 0..count {
            let mut stop = ServiceStop::new(&format!("stat{index}"));
            stop.stop_name = Some(format!("Station {index}"));
            stop.departure_time = parse_iso_datetime("2015-04-01T12:00:00+02:00");
            service.stops.push(stop);
        }
        service
    }

    #[test]
    fn record_fields() {
        let service = prepare_service("123");
        let record = InjectionRecord::build(&service, 0, 3).unwrap();

        assert_eq!(record.service_number, "123");
        assert_eq!(record.service_id, "i123");
        assert_eq!(record.service_date, "2015-04-01");
        assert_eq!(record.destination_code.as_deref(), Some("rtd"));
        assert_eq!(record.destination_text.as_deref(), Some("Rotterdam Centraal"));
        assert_eq!(record.transmode_code.as_deref(), Some("IC"));
        assert_eq!(record.transmode_text.as_deref(), Some("Intercity"));
        assert_eq!(record.company.as_deref(), Some("Nederlandse Spoorwegen"));
        assert_eq!(record.platform.as_deref(), Some("5b"));
        assert_eq!(record.stop_code, "ut");
        assert_eq!(record.departure.as_deref(), Some("2015-04-01T12:34:00+02:00"));
        assert!(!record.do_not_board);
    }

    #[test]
    fn via_and_upcoming_stops() {
        let service = numbered_stops(15);

        // First stop: a full via list and every later stop upcoming.
        let record = InjectionRecord::build(&service, 0, 3).unwrap();
        assert_eq!(record.via.len(), 3);
        assert_eq!(record.stops.len(), 14);
        assert_eq!(record.via[0].code, "stat1");
        assert_eq!(record.via[2].code, "stat3");
        assert_eq!(record.stops[0].code, "stat1");
        assert_eq!(record.stops[13].code, "stat14");

        // Second to last stop: one via stop, two upcoming.
        let record = InjectionRecord::build(&service, 12, 3).unwrap();
        assert_eq!(record.via.len(), 1);
        assert_eq!(record.stops.len(), 2);
        assert_eq!(record.via[0].code, "stat13");
        assert_eq!(record.stops[1].code, "stat14");

        // Last served stop: no via, only the destination upcoming.
        let record = InjectionRecord::build(&service, 13, 3).unwrap();
        assert!(record.via.is_empty());
        assert_eq!(record.stops.len(), 1);
        assert_eq!(record.stops[0].code, "stat14");

        // The destination itself: nothing left.
        let record = InjectionRecord::build(&service, 14, 3).unwrap();
        assert!(record.via.is_empty());
        assert!(record.stops.is_empty());

        assert!(InjectionRecord::build(&service, 15, 3).is_none());
    }

    #[test]
    fn do_not_board_follows_attributes() {
        let no_boarding = Attribute::new("NIIN", "Do not board", AttributeProcessing::UnboardingOnly);
        let no_alighting = Attribute::new("NUIT", "Do not alight", AttributeProcessing::BoardingOnly);

        let mut service = prepare_service("123");
        service.stops[0].attributes.push(no_boarding.clone());
        service.stops[1].attributes.push(no_alighting.clone());
        service.stops[2].attributes.push(no_boarding);
        service.stops[2].attributes.push(no_alighting);

        assert!(InjectionRecord::build(&service, 0, 3).unwrap().do_not_board);
        assert!(!InjectionRecord::build(&service, 1, 3).unwrap().do_not_board);
        assert!(InjectionRecord::build(&service, 2, 3).unwrap().do_not_board);
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let service = prepare_service("123");
        let record = InjectionRecord::build(&service, 0, 3).unwrap();
        let encoded = serde_json::to_value(&record).unwrap();

        assert_eq!(encoded["service_number"], "123");
        assert_eq!(encoded["destination_text"], "Rotterdam Centraal");
        assert_eq!(encoded["do_not_board"], false);
        assert_eq!(encoded["via"][0]["code"], "asd");
    }
}
