use std::{path::PathBuf, process};

use clap::Parser;
use config::Configuration;
use injection::Injector;
use store::{RedisKeyspace, ServiceStore};

/// InfoPlus DVS injector.
#[derive(Parser)]
#[command(name = "dvs-injector")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/serviceinfo.yaml")]
    config: PathBuf,
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

    let injector_config = match configuration.injector() {
        Ok(injector_config) => injector_config.clone(),
        Err(why) => {
            eprintln!("{why}");
            process::exit(1);
        }
    };

    let keyspace = match RedisKeyspace::connect(&configuration.schedule_store.url()).await {
        Ok(keyspace) => keyspace,
        Err(why) => {
            log::error!("{why}");
            process::exit(1);
        }
    };

    let injector = Injector::new(ServiceStore::new(keyspace), injector_config);
    match injector.run().await {
        Ok(completed) => log::info!("{completed} departures injected"),
        Err(why) => {
            log::error!("{why}");
            process::exit(1);
        }
    }
}
