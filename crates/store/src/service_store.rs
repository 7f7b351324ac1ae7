//! Two-tier keyed store for services. Scheduled and actual information live
//! side by side; combined reads prefer actual over scheduled. All entries are
//! addressed by `(tier, service date, service number, service id)` so that a
//! query by public number returns every wing of a run without scanning.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset};
use indexmap::IndexSet;
use model::{Service, ServiceSource, ServiceStop};
use serde::{Deserialize, Serialize};
use utility::time::get_service_date;

use crate::{keyspace::Keyspace, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTier {
    Scheduled,
    Actual,
}

impl StoreTier {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreTier::Scheduled => "scheduled",
            StoreTier::Actual => "actual",
        }
    }

    pub fn source(self) -> ServiceSource {
        match self {
            StoreTier::Scheduled => ServiceSource::Scheduled,
            StoreTier::Actual => ServiceSource::Actual,
        }
    }
}

impl fmt::Display for StoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-side tier selection. `ActualOrScheduled` falls back to the
/// scheduled layer when no actual record exists for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierSelector {
    Scheduled,
    Actual,
    #[default]
    ActualOrScheduled,
}

impl TierSelector {
    /// Parses the HTTP `type` query value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(TierSelector::Scheduled),
            "actual" => Some(TierSelector::Actual),
            "combined" => Some(TierSelector::ActualOrScheduled),
            _ => None,
        }
    }

    fn candidates(self) -> &'static [StoreTier] {
        match self {
            TierSelector::Scheduled => &[StoreTier::Scheduled],
            TierSelector::Actual => &[StoreTier::Actual],
            TierSelector::ActualOrScheduled => &[StoreTier::Actual, StoreTier::Scheduled],
        }
    }
}

impl From<StoreTier> for TierSelector {
    fn from(tier: StoreTier) -> Self {
        match tier {
            StoreTier::Scheduled => TierSelector::Scheduled,
            StoreTier::Actual => TierSelector::Actual,
        }
    }
}

/// Small per-service summary, kept next to the payload so time-window
/// queries never rehydrate full stop lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub servicenumber: String,
    pub first_departure: Option<DateTime<FixedOffset>>,
    pub last_arrival: Option<DateTime<FixedOffset>>,
}

impl ServiceSummary {
    fn of(service: &Service) -> Self {
        Self {
            servicenumber: service.servicenumber.clone(),
            first_departure: service.first_departure(),
            last_arrival: service.last_arrival(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceStore<K: Keyspace> {
    keyspace: K,
}

fn dates_key(tier: StoreTier) -> String {
    format!("schedule:dates:{tier}")
}

fn numbers_key(tier: StoreTier, date: &str) -> String {
    format!("schedule:numbers:{tier}:{date}")
}

fn ids_key(tier: StoreTier, date: &str, number: &str) -> String {
    format!("schedule:ids:{tier}:{date}:{number}")
}

fn detail_key(tier: StoreTier, date: &str, service_id: &str) -> String {
    format!("schedule:service:{tier}:{date}:{service_id}")
}

fn meta_key(tier: StoreTier, date: &str, service_id: &str) -> String {
    format!("schedule:meta:{tier}:{date}:{service_id}")
}

impl<K: Keyspace> ServiceStore<K> {
    pub fn new(keyspace: K) -> Self {
        Self { keyspace }
    }

    pub fn keyspace(&self) -> &K {
        &self.keyspace
    }

    /// Stores a service, replacing any previous record with the same
    /// `(tier, date, number, id)`. Stops without any time are dropped and
    /// consecutive duplicate stops collapse to the later one before the
    /// payload is written. Storing the same service twice leaves the store
    /// unchanged.
    pub async fn store(&self, service: &Service, tier: StoreTier) -> Result<()> {
        let stops = sanitize_stops(&service.stops);
        if stops.len() < 2 {
            log::warn!(
                "Not storing service {} on {}: fewer than two usable stops",
                service.service_id,
                service.servicedate_str()
            );
            return Ok(());
        }

        let date = service.servicedate_str();
        let mut record = service.clone();
        record.stops = stops;
        record.source = tier.source();

        // Full overwrite, never a merge.
        self.keyspace
            .remove(&detail_key(tier, &date, &record.service_id))
            .await?;
        self.keyspace
            .remove(&meta_key(tier, &date, &record.service_id))
            .await?;

        let summary = ServiceSummary::of(&record);
        self.keyspace
            .set(
                &detail_key(tier, &date, &record.service_id),
                &serde_json::to_string(&record)?,
            )
            .await?;
        self.keyspace
            .set(
                &meta_key(tier, &date, &record.service_id),
                &serde_json::to_string(&summary)?,
            )
            .await?;

        self.keyspace
            .set_add(
                &ids_key(tier, &date, &record.servicenumber),
                &record.service_id,
            )
            .await?;
        self.keyspace
            .set_add(&numbers_key(tier, &date), &record.servicenumber)
            .await?;
        self.keyspace.set_add(&dates_key(tier), &date).await?;

        Ok(())
    }

    pub async fn store_services(&self, services: &[Service], tier: StoreTier) -> Result<()> {
        for service in services {
            self.store(service, tier).await?;
        }
        Ok(())
    }

    /// Service dates present in the selected tier(s).
    pub async fn get_dates(&self, selector: TierSelector) -> Result<Vec<String>> {
        let mut dates = IndexSet::new();
        for tier in selector.candidates() {
            dates.extend(self.keyspace.set_members(&dates_key(*tier)).await?);
        }
        Ok(dates.into_iter().collect())
    }

    /// Service numbers on a date. The combined selector returns the union
    /// of both tiers.
    pub async fn get_numbers(&self, date: &str, selector: TierSelector) -> Result<Vec<String>> {
        let mut numbers = IndexSet::new();
        for tier in selector.candidates() {
            numbers.extend(self.keyspace.set_members(&numbers_key(*tier, date)).await?);
        }
        Ok(numbers.into_iter().collect())
    }

    /// All services (wings included) known under a public number. For the
    /// combined selector the actual list wins over the scheduled one.
    pub async fn get(
        &self,
        date: &str,
        number: &str,
        selector: TierSelector,
    ) -> Result<Option<Vec<Service>>> {
        for tier in selector.candidates() {
            let ids = self.keyspace.set_members(&ids_key(*tier, date, number)).await?;
            if ids.is_empty() {
                continue;
            }

            let mut services = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(mut service) = self.load_service(*tier, date, &id).await? {
                    // Wings share one payload; the record answers for the
                    // number it was asked under.
                    service.servicenumber = number.to_owned();
                    services.push(service);
                }
            }

            if !services.is_empty() {
                return Ok(Some(services));
            }
        }
        Ok(None)
    }

    /// Summaries for a public number, with the tier they were found in.
    pub async fn get_metadata(
        &self,
        date: &str,
        number: &str,
        selector: TierSelector,
    ) -> Result<Option<(StoreTier, Vec<(String, ServiceSummary)>)>> {
        for tier in selector.candidates() {
            let ids = self.keyspace.set_members(&ids_key(*tier, date, number)).await?;
            if ids.is_empty() {
                continue;
            }

            let mut summaries = Vec::with_capacity(ids.len());
            for id in ids {
                match self.keyspace.get(&meta_key(*tier, date, &id)).await? {
                    None => {
                        log::debug!("No summary for service {id} on {date}");
                    }
                    Some(payload) => match serde_json::from_str::<ServiceSummary>(&payload) {
                        Ok(mut summary) => {
                            summary.servicenumber = number.to_owned();
                            summaries.push((id, summary));
                        }
                        Err(why) => {
                            log::warn!("Corrupt summary for service {id} on {date}: {why}");
                        }
                    },
                }
            }

            if !summaries.is_empty() {
                return Ok(Some((*tier, summaries)));
            }
        }
        Ok(None)
    }

    /// Removes every service stored under a public number, together with the
    /// index entries of all secondary numbers the deleted runs carried
    /// (wings cleanup). Returns whether anything was deleted.
    pub async fn delete(&self, date: &str, number: &str, tier: StoreTier) -> Result<bool> {
        let ids = self.keyspace.set_members(&ids_key(tier, date, number)).await?;
        if ids.is_empty() {
            return Ok(false);
        }

        for id in &ids {
            // Collect every number this run was known under before the
            // payload goes away.
            let mut numbers: IndexSet<String> = IndexSet::new();
            numbers.insert(number.to_owned());
            if let Some(service) = self.load_service(tier, date, id).await? {
                numbers.insert(service.servicenumber.clone());
                for stop in &service.stops {
                    if !stop.servicenumber.is_empty() {
                        numbers.insert(stop.servicenumber.clone());
                    }
                }
            }

            self.keyspace.remove(&detail_key(tier, date, id)).await?;
            self.keyspace.remove(&meta_key(tier, date, id)).await?;

            for secondary in &numbers {
                self.keyspace
                    .set_remove(&ids_key(tier, date, secondary), id)
                    .await?;
                if self
                    .keyspace
                    .set_members(&ids_key(tier, date, secondary))
                    .await?
                    .is_empty()
                {
                    self.keyspace
                        .set_remove(&numbers_key(tier, date), secondary)
                        .await?;
                }
            }
        }

        if self
            .keyspace
            .set_members(&numbers_key(tier, date))
            .await?
            .is_empty()
        {
            self.keyspace.set_remove(&dates_key(tier), date).await?;
        }

        Ok(true)
    }

    /// Drops everything stored under `(tier, date)` via a keyspace scan.
    pub async fn trash_store(&self, date: &str, tier: StoreTier) -> Result<()> {
        let patterns = [
            detail_key(tier, date, "*"),
            meta_key(tier, date, "*"),
            ids_key(tier, date, "*"),
        ];
        for pattern in patterns {
            for key in self.keyspace.scan(&pattern).await? {
                self.keyspace.remove(&key).await?;
            }
        }

        self.keyspace.remove(&numbers_key(tier, date)).await?;
        self.keyspace.set_remove(&dates_key(tier), date).await?;
        Ok(())
    }

    /// Services whose first departure or last arrival falls inside
    /// `[from, to]`, read through the combined view. The candidate service
    /// dates follow from the operational-day rule applied to `from` and
    /// `from + 24h`.
    pub async fn services_between(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<Service>> {
        if from > to {
            return Ok(Vec::new());
        }

        let mut dates = IndexSet::new();
        dates.insert(format_date(get_service_date(from)));
        dates.insert(format_date(get_service_date(from + Duration::hours(24))));

        let mut found = Vec::new();
        for date in &dates {
            for number in self
                .get_numbers(date, TierSelector::ActualOrScheduled)
                .await?
            {
                let Some((tier, summaries)) = self
                    .get_metadata(date, &number, TierSelector::ActualOrScheduled)
                    .await?
                else {
                    continue;
                };

                for (id, summary) in summaries {
                    let departs = summary
                        .first_departure
                        .is_some_and(|time| time >= from && time <= to);
                    let arrives = summary
                        .last_arrival
                        .is_some_and(|time| time >= from && time <= to);
                    if !departs && !arrives {
                        continue;
                    }

                    match self.load_service(tier, date, &id).await? {
                        Some(mut service) => {
                            service.servicenumber = number.clone();
                            found.push(service);
                        }
                        None => {
                            log::warn!("Summary without payload for service {id} on {date}");
                        }
                    }
                }
            }
        }

        Ok(found)
    }

    /// Number of stored service numbers in a tier, summed over all dates.
    pub async fn stored_services(&self, tier: StoreTier) -> Result<usize> {
        let selector = TierSelector::from(tier);
        let mut total = 0;
        for date in self.get_dates(selector).await? {
            total += self.get_numbers(&date, selector).await?.len();
        }
        Ok(total)
    }

    async fn load_service(
        &self,
        tier: StoreTier,
        date: &str,
        service_id: &str,
    ) -> Result<Option<Service>> {
        let Some(payload) = self.keyspace.get(&detail_key(tier, date, service_id)).await? else {
            // Index entries may transiently point at deleted payloads;
            // readers treat them as not found.
            return Ok(None);
        };

        match serde_json::from_str::<Service>(&payload) {
            Ok(mut service) => {
                service.source = tier.source();
                Ok(Some(service))
            }
            Err(why) => {
                log::warn!("Corrupt payload for service {service_id} on {date}: {why}");
                Ok(None)
            }
        }
    }
}

fn format_date(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Collapses consecutive duplicate stop codes to the later stop, then drops
/// stops without any time.
fn sanitize_stops(stops: &[ServiceStop]) -> Vec<ServiceStop> {
    let mut result: Vec<ServiceStop> = Vec::with_capacity(stops.len());
    for stop in stops {
        if result
            .last()
            .is_some_and(|previous| previous.stop_code == stop.stop_code)
        {
            result.pop();
        }
        result.push(stop.clone());
    }

    result.retain(ServiceStop::has_time);
    result
}
