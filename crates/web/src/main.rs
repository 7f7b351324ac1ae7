use std::{path::PathBuf, process};

use clap::Parser;
use config::Configuration;
use iff::IffSource;
use store::{RedisKeyspace, ServiceStore};
use tracing_subscriber::EnvFilter;
use web::{start_web_server, WebState};

/// Serviceinfo HTTP server.
#[derive(Parser)]
#[command(name = "serviceinfo-http")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/serviceinfo.yaml")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,
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

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("HTTP server starting");

    let keyspace = match RedisKeyspace::connect(&configuration.schedule_store.url()).await {
        Ok(keyspace) => keyspace,
        Err(why) => {
            tracing::error!("{why}");
            process::exit(1);
        }
    };

    // The timetable fallback is optional; without it the server answers
    // from the store alone.
    let iff = match &configuration.iff_database {
        Some(database) => match IffSource::connect(database) {
            Ok(source) => Some(source),
            Err(why) => {
                tracing::error!("{why}");
                process::exit(1);
            }
        },
        None => None,
    };

    let state = WebState {
        store: ServiceStore::new(keyspace),
        iff,
        filter: configuration.scheduler.filter.clone(),
    };

    tracing::info!("Listening on {}:{}", args.bind, args.port);
    if let Err(why) = start_web_server(state, &args.bind, args.port).await {
        tracing::error!("{why}");
        process::exit(1);
    }
}
