//! Replays a dump of ARNU messages (one XML document per line) straight
//! into the actual tier, bypassing the socket. Useful for testing a store
//! against recorded traffic.

use std::{path::PathBuf, process};

use arnu::Action;
use clap::Parser;
use config::Configuration;
use iff::IffSource;
use store::{RedisKeyspace, ServiceStore, StoreTier};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

/// ARNU message replay tool.
#[derive(Parser)]
#[command(name = "arnu-tester")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/serviceinfo.yaml")]
    config: PathBuf,

    /// ARNU message file (one XML message per line)
    file: PathBuf,
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

    log::info!("Test tool starting");

    if let Err(why) = replay(&configuration, &args.file).await {
        log::error!("{why}");
        process::exit(1);
    }
}

async fn replay(
    configuration: &Configuration,
    path: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = IffSource::connect(configuration.iff_database()?)?;
    let keyspace = RedisKeyspace::connect(&configuration.schedule_store.url()).await?;
    let store = ServiceStore::new(keyspace);

    log::info!("Loading message dump");

    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut message_counter = 0usize;
    let mut service_counter = 0usize;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        message_counter += 1;

        let services = match arnu::parse_message(&line, &source).await {
            Ok(services) => services,
            Err(why) => {
                log::error!("Message {message_counter} not processed: {why}");
                continue;
            }
        };

        for (service, action) in services {
            service_counter += 1;
            match action {
                Action::Store => store.store(&service, StoreTier::Actual).await?,
                Action::Remove => {
                    store
                        .delete(
                            &service.servicedate_str(),
                            &service.servicenumber,
                            StoreTier::Actual,
                        )
                        .await?;
                }
            }
        }
    }

    log::info!(
        "Finished processing {service_counter} services from {message_counter} ARNU messages"
    );

    Ok(())
}
