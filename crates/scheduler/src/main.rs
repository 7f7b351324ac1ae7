//! Seeds the scheduled tier of the service store with the timetable of one
//! service date.

use std::{path::PathBuf, process};

use chrono::{NaiveDate, Utc};
use clap::Parser;
use config::Configuration;
use model::is_service_included;
use store::{RedisKeyspace, ServiceStore, StoreTier};
use utility::time::{get_service_date, TIMETABLE_TIMEZONE};

/// IFF/ARNU service scheduler.
#[derive(Parser)]
#[command(name = "scheduler")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/scheduler.yaml")]
    config: PathBuf,

    /// Service date (YYYY-MM-DD, default: the current operational day)
    #[arg(short = 'd', long)]
    servicedate: Option<String>,
}

fn resolve_service_date(argument: Option<&str>) -> Option<NaiveDate> {
    match argument {
        None => {
            let now = Utc::now().with_timezone(&TIMETABLE_TIMEZONE).fixed_offset();
            Some(get_service_date(now))
        }
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let configuration = match Configuration::load(&args.config) {
        Ok(configuration) => configuration,
        Err(why) => {
            eprintln!("{why}");
            process::exit(1);
        }
    };
    config::setup_logging(&configuration.logging);

    let Some(service_date) = resolve_service_date(args.servicedate.as_deref()) else {
        eprintln!("Invalid service date");
        process::exit(1);
    };

    log::info!("Scheduler starting");

    if let Err(why) = load_schedule(&configuration, service_date).await {
        log::error!("{why}");
        process::exit(1);
    }
}

async fn load_schedule(
    configuration: &Configuration,
    service_date: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = iff::IffSource::connect(configuration.iff_database()?)?;
    let keyspace = RedisKeyspace::connect(&configuration.schedule_store.url()).await?;
    let store = ServiceStore::new(keyspace);

    log::debug!("Getting services for {service_date}");
    let service_ids = source.services_for_date(service_date).await?;
    log::info!(
        "Found {} scheduled services on {service_date}",
        service_ids.len()
    );

    let services = source.services_details(&service_ids, service_date).await?;
    let selected: Vec<_> = services
        .into_iter()
        .filter(|service| is_service_included(service, &configuration.scheduler.filter))
        .collect();
    log::info!("Loaded {} services", selected.len());

    log::debug!("Storing schedule to store");
    store.store_services(&selected, StoreTier::Scheduled).await?;
    log::info!("Services stored to schedule");

    Ok(())
}
