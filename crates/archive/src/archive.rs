use std::collections::HashSet;

use chrono::NaiveDate;
use config::DatabaseConfig;
use model::{Service, ServiceSource, ServiceStop};
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions};
use sqlx::Transaction;
use store::{Keyspace, ServiceStore, TierSelector};

use crate::Result;

pub struct Archive<K: Keyspace> {
    pool: MySqlPool,
    store: ServiceStore<K>,
}

impl<K: Keyspace> Archive<K> {
    pub fn new(archive_config: &DatabaseConfig, store: ServiceStore<K>) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect_lazy(&archive_config.url())?;

        Ok(Self { pool, store })
    }

    /// Writes every service of one date (combined view) to the archive:
    /// one `services` row per service, one `stops` row per stop. Stations
    /// and transport modes are deduplicated per run. Commits once at the
    /// end.
    pub async fn store_archive(&self, service_date: NaiveDate) -> Result<usize> {
        let date = service_date.format("%Y-%m-%d").to_string();

        log::info!("Retrieving service numbers");
        let numbers = self
            .store
            .get_numbers(&date, TierSelector::ActualOrScheduled)
            .await?;
        log::info!(
            "Found {} service definitions, storing to archive...",
            numbers.len()
        );

        let mut transaction = self.pool.begin().await?;
        let mut seen_stations: HashSet<String> = HashSet::new();
        let mut seen_modes: HashSet<String> = HashSet::new();
        let mut processed = 0;

        for number in &numbers {
            let Some(services) = self
                .store
                .get(&date, number, TierSelector::ActualOrScheduled)
                .await?
            else {
                log::warn!("No data for service number {number}");
                continue;
            };

            for service in &services {
                let service_row = self.store_service(&mut transaction, service).await?;
                self.store_stops(&mut transaction, service_row, service, &mut seen_stations)
                    .await?;
                self.store_transport_mode(&mut transaction, service, &mut seen_modes)
                    .await?;
            }
            processed += 1;
        }

        log::info!("Committing");
        transaction.commit().await?;
        log::info!("{processed} services stored to archive");

        Ok(processed)
    }

    async fn store_service(
        &self,
        transaction: &mut Transaction<'_, MySql>,
        service: &Service,
    ) -> Result<u64> {
        let source = match service.source {
            ServiceSource::Actual => "actual",
            ServiceSource::Scheduled => "scheduled",
            ServiceSource::Iff => "iff",
        };

        let result = sqlx::query(
            "
            INSERT INTO services
              (service_date, service_number, company, transport_mode, cancelled,
              partly_cancelled, max_delay, `from`, `to`, `source`)
            VALUES
              (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
            ",
        )
        .bind(service.servicedate_str())
        .bind(&service.servicenumber)
        .bind(&service.company_code)
        .bind(&service.transport_mode)
        .bind(service.cancelled)
        .bind(service.partly_cancelled())
        .bind(service.max_delay())
        .bind(service.departure_str())
        .bind(service.destination_str())
        .bind(source)
        .execute(&mut **transaction)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn store_stops(
        &self,
        transaction: &mut Transaction<'_, MySql>,
        service_row: u64,
        service: &Service,
        seen_stations: &mut HashSet<String>,
    ) -> Result<()> {
        for (stop_nr, stop) in service.stops.iter().enumerate() {
            self.store_stop(transaction, service_row, stop_nr as i64, stop)
                .await?;
            self.store_station(transaction, stop, seen_stations).await?;
        }

        Ok(())
    }

    async fn store_stop(
        &self,
        transaction: &mut Transaction<'_, MySql>,
        service_row: u64,
        stop_nr: i64,
        stop: &ServiceStop,
    ) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO stops
              (service_id, stop_nr, `stop`, service_number, arrival, arrival_delay,
              arrival_cancelled, arrival_platform, arrival_platform_scheduled,
              departure, departure_delay, departure_cancelled, departure_platform,
              departure_platform_scheduled)
            VALUES
              (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
            ",
        )
        .bind(service_row)
        .bind(stop_nr)
        .bind(&stop.stop_code)
        .bind(&stop.servicenumber)
        .bind(stop.arrival_time.map(|time| time.naive_local()))
        .bind(stop.arrival_delay)
        .bind(stop.cancelled_arrival)
        .bind(stop.arrival_platform())
        .bind(&stop.scheduled_arrival_platform)
        .bind(stop.departure_time.map(|time| time.naive_local()))
        .bind(stop.departure_delay)
        .bind(stop.cancelled_departure)
        .bind(stop.departure_platform())
        .bind(&stop.scheduled_departure_platform)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    async fn store_station(
        &self,
        transaction: &mut Transaction<'_, MySql>,
        stop: &ServiceStop,
        seen_stations: &mut HashSet<String>,
    ) -> Result<()> {
        if !seen_stations.insert(stop.stop_code.clone()) {
            return Ok(());
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT name FROM stations WHERE code = ?;")
                .bind(&stop.stop_code)
                .fetch_optional(&mut **transaction)
                .await?;

        if existing.is_none() {
            sqlx::query("INSERT INTO stations (code, name) VALUES (?, ?);")
                .bind(&stop.stop_code)
                .bind(&stop.stop_name)
                .execute(&mut **transaction)
                .await?;
        }

        Ok(())
    }

    async fn store_transport_mode(
        &self,
        transaction: &mut Transaction<'_, MySql>,
        service: &Service,
        seen_modes: &mut HashSet<String>,
    ) -> Result<()> {
        let Some(mode) = &service.transport_mode else {
            return Ok(());
        };
        if !seen_modes.insert(mode.clone()) {
            return Ok(());
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT `mode` FROM transport_modes WHERE `mode` = ?;")
                .bind(mode)
                .fetch_optional(&mut **transaction)
                .await?;

        if existing.is_none() {
            sqlx::query("INSERT INTO transport_modes (`mode`, mode_description) VALUES (?, ?);")
                .bind(mode)
                .bind(&service.transport_mode_description)
                .execute(&mut **transaction)
                .await?;
        }

        Ok(())
    }
}
