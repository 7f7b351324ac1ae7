use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use config::DatabaseConfig;
use indexmap::IndexSet;
use model::{Attribute, AttributeProcessing, Service, ServiceSource, ServiceStop};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use utility::time::{combine_local, TIMETABLE_TIMEZONE};

use crate::Result;

#[derive(Clone)]
pub struct IffSource {
    pool: MySqlPool,
    timezone: Tz,
}

#[derive(Debug, sqlx::FromRow)]
struct StopRow {
    servicenumber: Option<i64>,
    station: String,
    name: Option<String>,
    arrival: Option<i64>,
    departure: Option<i64>,
    arrival_platform: Option<String>,
    departure_platform: Option<String>,
    transmode: Option<String>,
    transmode_description: Option<String>,
    company: Option<String>,
    company_name: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct AttributeRow {
    firststop: i64,
    laststop: i64,
    code: String,
    description: Option<String>,
    processingcode: Option<i64>,
}

impl IffSource {
    /// Opens a lazy connection pool; connections are checked before reuse so
    /// idle drops recover transparently.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .test_before_acquire(true)
            .connect_lazy(&config.url())?;

        Ok(Self {
            pool,
            timezone: TIMETABLE_TIMEZONE,
        })
    }

    /// Ids of every service valid on a date.
    pub async fn services_for_date(&self, service_date: NaiveDate) -> Result<Vec<String>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "
            SELECT DISTINCT ts.serviceid FROM timetable_service ts
            JOIN timetable_validity tv ON (ts.serviceid = tv.serviceid)
            JOIN footnote f ON (tv.footnote = f.footnote)
            WHERE f.servicedate = ?;
            ",
        )
        .bind(service_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    /// Hydrates one timetable service into the domain model. A run that
    /// carries several public numbers along its path produces one `Service`
    /// per number, each with the full stop list. Unknown ids yield `None`.
    pub async fn service_details(
        &self,
        service_id: &str,
        service_date: NaiveDate,
    ) -> Result<Option<Vec<Service>>> {
        let Ok(numeric_id) = service_id.parse::<i64>() else {
            return Ok(None);
        };

        let rows: Vec<StopRow> = sqlx::query_as(
            "
            SELECT
                t_sv.servicenumber, ts.station, s.name,
                CAST(TIME_TO_SEC(ts.arrivaltime) AS SIGNED) AS arrival,
                CAST(TIME_TO_SEC(ts.departuretime) AS SIGNED) AS departure,
                p.arrival AS arrival_platform, p.departure AS departure_platform,
                tt.transmode, tm.description AS transmode_description,
                t_sv.company, c.name AS company_name
            FROM timetable_stop ts
            JOIN station s ON ts.station = s.shortname
            JOIN timetable_service t_sv
                ON (ts.serviceid = t_sv.serviceid AND t_sv.firststop <= ts.idx AND t_sv.laststop >= ts.idx)
            JOIN timetable_validity tv ON (t_sv.serviceid = tv.serviceid)
            JOIN footnote f_s ON (tv.footnote = f_s.footnote)
            LEFT JOIN timetable_platform p ON (ts.serviceid = p.serviceid AND ts.idx = p.idx)
            LEFT JOIN footnote f_p ON (p.footnote = f_p.footnote AND f_p.servicedate = f_s.servicedate)
            LEFT JOIN timetable_transport tt
                ON (tt.serviceid = ts.serviceid AND tt.firststop <= ts.idx AND tt.laststop >= ts.idx)
            LEFT JOIN trnsmode tm ON (tt.transmode = tm.code)
            LEFT JOIN company c ON (t_sv.company = c.company)
            WHERE
                ts.serviceid = ?
                AND f_s.servicedate = ?
            ORDER BY ts.idx;
            ",
        )
        .bind(numeric_id)
        .bind(service_date)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let attributes: Vec<AttributeRow> = sqlx::query_as(
            "
            SELECT ta.firststop, ta.laststop, ta.attribute AS code,
                tr.description, tr.processingcode
            FROM timetable_attribute ta
            LEFT JOIN trnsattr tr ON (ta.attribute = tr.code)
            WHERE ta.serviceid = ?;
            ",
        )
        .bind(numeric_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(build_services(
            service_id,
            service_date,
            &rows,
            &attributes,
            self.timezone,
        )))
    }

    /// Details for every id valid on a date; unknown ids are skipped with a
    /// warning.
    pub async fn services_details(
        &self,
        service_ids: &[String],
        service_date: NaiveDate,
    ) -> Result<Vec<Service>> {
        let mut services = Vec::new();
        for service_id in service_ids {
            match self.service_details(service_id, service_date).await? {
                Some(found) => services.extend(found),
                None => log::warn!("Skipping service {service_id}"),
            }
        }
        Ok(services)
    }

    /// Scheduled services carrying a public number on a date; used by the
    /// HTTP surface when the store has no record.
    pub async fn services_for_number(
        &self,
        service_date: NaiveDate,
        servicenumber: &str,
    ) -> Result<Option<Vec<Service>>> {
        let Ok(number) = servicenumber.parse::<i64>() else {
            return Ok(None);
        };

        let ids: Vec<i64> = sqlx::query_scalar(
            "
            SELECT DISTINCT ts.serviceid FROM timetable_service ts
            JOIN timetable_validity tv ON (ts.serviceid = tv.serviceid)
            JOIN footnote f ON (tv.footnote = f.footnote)
            WHERE f.servicedate = ? AND ts.servicenumber = ?;
            ",
        )
        .bind(service_date)
        .bind(number)
        .fetch_all(&self.pool)
        .await?;

        let mut services = Vec::new();
        for id in ids {
            if let Some(found) = self.service_details(&id.to_string(), service_date).await? {
                services.extend(
                    found
                        .into_iter()
                        .filter(|service| service.servicenumber == servicenumber),
                );
            }
        }

        if services.is_empty() {
            Ok(None)
        } else {
            Ok(Some(services))
        }
    }

    pub async fn station_name(&self, station_code: &str) -> Result<Option<String>> {
        let name = sqlx::query_scalar("SELECT name FROM station WHERE shortname = ?;")
            .bind(station_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    pub async fn transport_mode(&self, mode_code: &str) -> Result<Option<String>> {
        let description = sqlx::query_scalar("SELECT description FROM trnsmode WHERE code = ?;")
            .bind(mode_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(description)
    }

    pub async fn company_name(&self, company_code: &str) -> Result<Option<String>> {
        let name = sqlx::query_scalar("SELECT name FROM company WHERE company = ?;")
            .bind(company_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }
}

/// Turns the ordered stop rows of one timetable service into one `Service`
/// per public number found along the path.
fn build_services(
    service_id: &str,
    service_date: NaiveDate,
    rows: &[StopRow],
    attribute_rows: &[AttributeRow],
    timezone: Tz,
) -> Vec<Service> {
    let mut servicenumbers: IndexSet<String> = IndexSet::new();
    let mut stops: Vec<ServiceStop> = Vec::with_capacity(rows.len());

    let mut transport_mode = None;
    let mut transport_mode_description = None;
    let mut company_code = None;
    let mut company_name = None;
    let mut metadata_set = false;

    for (index, row) in rows.iter().enumerate() {
        let servicenumber = number_for(row.servicenumber, service_id);
        servicenumbers.insert(servicenumber.clone());

        if !metadata_set {
            transport_mode = row.transmode.clone();
            transport_mode_description = row.transmode_description.clone();
            company_code = row.company.clone();
            company_name = row.company_name.clone();
            metadata_set = true;
        }

        let mut stop = ServiceStop::new(&row.station);
        stop.stop_name = row.name.clone();
        stop.servicenumber = servicenumber;
        stop.arrival_time = row
            .arrival
            .and_then(|seconds| combine_local(service_date, Duration::seconds(seconds), timezone));
        stop.departure_time = row
            .departure
            .and_then(|seconds| combine_local(service_date, Duration::seconds(seconds), timezone));
        stop.scheduled_arrival_platform = row.arrival_platform.clone();
        stop.scheduled_departure_platform = row.departure_platform.clone();

        // Attribute ranges refer to the 1-based row index.
        let row_index = (index + 1) as i64;
        for attribute_row in attribute_rows {
            if attribute_row.firststop <= row_index && attribute_row.laststop >= row_index {
                stop.attributes.push(Attribute {
                    code: attribute_row.code.clone(),
                    description: attribute_row.description.clone().unwrap_or_default(),
                    processing_code: processing_code(attribute_row.processingcode),
                });
            }
        }

        // Consecutive duplicate stops collapse to the later one.
        if stops
            .last()
            .is_some_and(|previous| previous.stop_code == stop.stop_code)
        {
            stops.pop();
        }

        stops.push(stop);
    }

    servicenumbers
        .into_iter()
        .map(|servicenumber| {
            let mut service = Service::new(service_id, service_date, &servicenumber);
            service.transport_mode = transport_mode.clone();
            service.transport_mode_description = transport_mode_description.clone();
            service.company_code = company_code.clone();
            service.company_name = company_name.clone();
            service.stops = stops.clone();
            service.source = ServiceSource::Iff;
            service
        })
        .collect()
}

/// Missing or zero service numbers become a synthetic `i{service_id}` id.
fn number_for(raw: Option<i64>, service_id: &str) -> String {
    match raw {
        Some(number) if number > 0 => number.to_string(),
        _ => {
            log::debug!("Invalid service number, using i{service_id} for service {service_id}");
            format!("i{service_id}")
        }
    }
}

fn processing_code(raw: Option<i64>) -> AttributeProcessing {
    match raw {
        Some(1) => AttributeProcessing::BoardingOnly,
        Some(2) => AttributeProcessing::UnboardingOnly,
        _ => AttributeProcessing::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn row(number: Option<i64>, station: &str, arrival: Option<i64>, departure: Option<i64>) -> StopRow {
        StopRow {
            servicenumber: number,
            station: station.to_owned(),
            name: Some(format!("Station {station}")),
            arrival,
            departure,
            arrival_platform: None,
            departure_platform: None,
            transmode: Some("IC".to_owned()),
            transmode_description: Some("Intercity".to_owned()),
            company: Some("NS".to_owned()),
            company_name: Some("Nederlandse Spoorwegen".to_owned()),
        }
    }

    fn service_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 4, 1).unwrap()
    }

    #[test]
    fn single_number_single_service() {
        let rows = vec![
            row(Some(1234), "UT", None, Some(7 * 3600)),
            row(Some(1234), "gd", Some(7 * 3600 + 1500), Some(7 * 3600 + 1560)),
            row(Some(1234), "rtd", Some(8 * 3600), None),
        ];

        let services = build_services("6815", service_date(), &rows, &[], TIMETABLE_TIMEZONE);
        assert_eq!(services.len(), 1);

        let service = &services[0];
        assert_eq!(service.service_id, "6815");
        assert_eq!(service.servicenumber, "1234");
        assert_eq!(service.source, ServiceSource::Iff);
        assert_eq!(service.transport_mode.as_deref(), Some("IC"));
        assert_eq!(service.company_code.as_deref(), Some("NS"));
        assert_eq!(service.stops.len(), 3);
        assert_eq!(service.stops[0].stop_code, "ut");
        assert_eq!(service.stops[0].departure_time.unwrap().hour(), 7);
        assert_eq!(service.stops[2].arrival_time.unwrap().hour(), 8);
    }

    #[test]
    fn renumbering_emits_one_service_per_number() {
        let rows = vec![
            row(Some(1750), "ut", None, Some(7 * 3600)),
            row(Some(1750), "gd", Some(7 * 3600 + 1200), Some(7 * 3600 + 1260)),
            row(Some(12850), "rtd", Some(8 * 3600), None),
        ];

        let services = build_services("77", service_date(), &rows, &[], TIMETABLE_TIMEZONE);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].servicenumber, "1750");
        assert_eq!(services[1].servicenumber, "12850");

        // Both carry the full stop list with per-stop numbers preserved.
        for service in &services {
            assert_eq!(service.stops.len(), 3);
            assert_eq!(service.stops[0].servicenumber, "1750");
            assert_eq!(service.stops[2].servicenumber, "12850");
        }
    }

    #[test]
    fn missing_numbers_synthesize_an_id() {
        let rows = vec![
            row(Some(0), "ut", None, Some(7 * 3600)),
            row(None, "rtd", Some(8 * 3600), None),
        ];

        let services = build_services("555", service_date(), &rows, &[], TIMETABLE_TIMEZONE);
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].servicenumber, "i555");
    }

    #[test]
    fn duplicate_consecutive_stops_collapse_to_the_later_row() {
        let rows = vec![
            row(Some(9), "ut", None, Some(7 * 3600)),
            row(Some(9), "asd", Some(8 * 3600), Some(8 * 3600 + 60)),
            row(Some(9), "asd", Some(8 * 3600 + 120), Some(8 * 3600 + 180)),
            row(Some(9), "rtd", Some(9 * 3600), None),
        ];

        let services = build_services("1", service_date(), &rows, &[], TIMETABLE_TIMEZONE);
        let stops = &services[0].stops;
        assert_eq!(stops.len(), 3);
        assert_eq!(stops[1].stop_code, "asd");
        assert_eq!(stops[1].arrival_time.unwrap().minute(), 2);
    }

    #[test]
    fn times_past_midnight_roll_into_the_next_day() {
        let rows = vec![
            row(Some(7), "ut", None, Some(23 * 3600 + 3000)),
            row(Some(7), "rtd", Some(25 * 3600 + 900), None),
        ];

        let services = build_services("2", service_date(), &rows, &[], TIMETABLE_TIMEZONE);
        let arrival = services[0].stops[1].arrival_time.unwrap();
        assert_eq!(
            arrival.date_naive(),
            NaiveDate::from_ymd_opt(2015, 4, 2).unwrap()
        );
        assert_eq!(arrival.hour(), 1);
        assert_eq!(arrival.minute(), 15);
    }

    #[test]
    fn attribute_ranges_apply_per_stop() {
        let rows = vec![
            row(Some(3), "ut", None, Some(7 * 3600)),
            row(Some(3), "gd", Some(7 * 3600 + 1200), Some(7 * 3600 + 1260)),
            row(Some(3), "rtd", Some(8 * 3600), None),
        ];
        let attributes = vec![
            AttributeRow {
                firststop: 1,
                laststop: 2,
                code: "NIIN".to_owned(),
                description: Some("Do not board".to_owned()),
                processingcode: Some(2),
            },
            AttributeRow {
                firststop: 3,
                laststop: 3,
                code: "NUIT".to_owned(),
                description: Some("Do not alight".to_owned()),
                processingcode: Some(1),
            },
        ];

        let services = build_services("3", service_date(), &rows, &attributes, TIMETABLE_TIMEZONE);
        let stops = &services[0].stops;

        assert_eq!(stops[0].attributes.len(), 1);
        assert_eq!(stops[0].attributes[0].code, "NIIN");
        assert_eq!(
            stops[0].attributes[0].processing_code,
            AttributeProcessing::UnboardingOnly
        );
        assert_eq!(stops[1].attributes.len(), 1);
        assert_eq!(stops[2].attributes.len(), 1);
        assert_eq!(
            stops[2].attributes[0].processing_code,
            AttributeProcessing::BoardingOnly
        );
    }
}
