//! Dumps a single statistics counter, for monitoring scripts.

use std::{path::PathBuf, process};

use clap::Parser;
use config::Configuration;
use store::{RedisKeyspace, ServiceStore, Statistics, StoreTier};

/// Statistics dump.
#[derive(Parser)]
#[command(name = "stats")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/serviceinfo.yaml")]
    config: PathBuf,

    /// Counter: messages, services, actual_services or scheduled_services
    counter: String,
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

    let keyspace = match RedisKeyspace::connect(&configuration.schedule_store.url()).await {
        Ok(keyspace) => keyspace,
        Err(why) => {
            eprintln!("{why}");
            process::exit(1);
        }
    };

    let statistics = Statistics::new(keyspace.clone());
    let store = ServiceStore::new(keyspace);

    let value = match args.counter.as_str() {
        "messages" => statistics.processed_messages().await,
        "services" => statistics.processed_services().await,
        "actual_services" => store
            .stored_services(StoreTier::Actual)
            .await
            .map(|count| count as i64),
        "scheduled_services" => store
            .stored_services(StoreTier::Scheduled)
            .await
            .map(|count| count as i64),
        _ => {
            eprintln!("Unknown counter '{}'", args.counter);
            process::exit(1);
        }
    };

    match value {
        Ok(value) => println!("{value}"),
        Err(why) => {
            eprintln!("{why}");
            process::exit(1);
        }
    }
}
