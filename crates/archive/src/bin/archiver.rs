//! Snapshots one completed service date from the store into the archive
//! database.

use std::{path::PathBuf, process};

use archive::Archive;
use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use config::Configuration;
use store::{RedisKeyspace, ServiceStore};
use utility::time::{get_service_date, TIMETABLE_TIMEZONE};

/// Service archiver.
#[derive(Parser)]
#[command(name = "archiver")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/serviceinfo.yaml")]
    config: PathBuf,

    /// Service date: TODAY, YESTERDAY or YYYY-MM-DD
    #[arg(short = 'd', long, default_value = "YESTERDAY")]
    servicedate: String,
}

fn resolve_service_date(argument: &str) -> Option<NaiveDate> {
    let now = Utc::now().with_timezone(&TIMETABLE_TIMEZONE).fixed_offset();
    match argument {
        "TODAY" => Some(get_service_date(now)),
        "YESTERDAY" => Some(get_service_date(now) - Duration::days(1)),
        value => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
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

    log::info!("Archiver starting");

    let Some(service_date) = resolve_service_date(&args.servicedate) else {
        log::error!("No valid service date, aborting.");
        process::exit(1);
    };

    log::info!("Archiving all services on {service_date}");

    if let Err(why) = run(&configuration, service_date).await {
        log::error!("{why}");
        process::exit(1);
    }
}

async fn run(
    configuration: &Configuration,
    service_date: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let keyspace = RedisKeyspace::connect(&configuration.schedule_store.url()).await?;
    let archive = Archive::new(
        configuration.archive_database()?,
        ServiceStore::new(keyspace),
    )?;
    archive.store_archive(service_date).await?;
    Ok(())
}
