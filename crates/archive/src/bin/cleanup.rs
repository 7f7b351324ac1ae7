//! Removes service data older than a threshold from the store.

use std::{path::PathBuf, process};

use archive::{cleanup_store, CleanupTarget};
use chrono::Utc;
use clap::Parser;
use config::Configuration;
use store::{RedisKeyspace, ServiceStore};
use utility::time::TIMETABLE_TIMEZONE;

/// Cleanup tool.
#[derive(Parser)]
#[command(name = "cleanup")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/serviceinfo.yaml")]
    config: PathBuf,

    /// Threshold before cleanup in days
    #[arg(short = 't', long, default_value_t = 1)]
    threshold: i64,

    /// Store type: actual, scheduled or all
    #[arg(short = 's', long, default_value = "all")]
    store: String,
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

    let Some(target) = CleanupTarget::parse(&args.store) else {
        eprintln!(
            "Error: invalid store type '{}', must be 'actual', 'scheduled' or 'all'.",
            args.store
        );
        process::exit(1);
    };

    if args.threshold < 0 {
        eprintln!("Error: invalid threshold '{}'.", args.threshold);
        process::exit(1);
    }

    log::info!("Starting cleanup");

    let keyspace = match RedisKeyspace::connect(&configuration.schedule_store.url()).await {
        Ok(keyspace) => keyspace,
        Err(why) => {
            log::error!("{why}");
            process::exit(1);
        }
    };
    let store = ServiceStore::new(keyspace);

    let today = utility::time::get_service_date(
        Utc::now().with_timezone(&TIMETABLE_TIMEZONE).fixed_offset(),
    );
    match cleanup_store(&store, args.threshold, target, today).await {
        Ok(removed) => log::info!("Removed {removed} service date(s)"),
        Err(why) => {
            log::error!("{why}");
            process::exit(1);
        }
    }
}
