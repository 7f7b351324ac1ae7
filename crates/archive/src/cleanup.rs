use chrono::{Duration, NaiveDate};
use store::{Keyspace, ServiceStore, StoreTier, TierSelector};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupTarget {
    Actual,
    Scheduled,
    All,
}

impl CleanupTarget {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "actual" => Some(CleanupTarget::Actual),
            "scheduled" => Some(CleanupTarget::Scheduled),
            "all" => Some(CleanupTarget::All),
            _ => None,
        }
    }

    fn tiers(self) -> &'static [StoreTier] {
        match self {
            CleanupTarget::Actual => &[StoreTier::Actual],
            CleanupTarget::Scheduled => &[StoreTier::Scheduled],
            CleanupTarget::All => &[StoreTier::Actual, StoreTier::Scheduled],
        }
    }
}

/// Trash-stores every service date older than `today - threshold_days` in
/// the selected tier(s). Returns the number of dates removed.
pub async fn cleanup_store<K: Keyspace>(
    store: &ServiceStore<K>,
    threshold_days: i64,
    target: CleanupTarget,
    today: NaiveDate,
) -> Result<usize> {
    let threshold_date = today - Duration::days(threshold_days);
    log::debug!("Threshold date: {threshold_date}");

    let mut dates = store.get_dates(TierSelector::ActualOrScheduled).await?;
    dates.sort();

    let mut removed = 0;
    for date in dates {
        let Ok(parsed) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
            log::warn!("Skipping unparseable service date {date}");
            continue;
        };

        if parsed >= threshold_date {
            log::info!("Keeping data for {date}");
            continue;
        }

        log::info!("Removing outdated services for {date}");
        for tier in target.tiers() {
            log::debug!("Removing {tier} services");
            store.trash_store(&date, *tier).await?;
        }
        removed += 1;
    }

    Ok(removed)
}
