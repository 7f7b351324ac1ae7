use std::{path::PathBuf, process};

use clap::Parser;
use config::Configuration;

/// ARNU realtime message processor.
#[derive(Parser)]
#[command(name = "arnu-listener")]
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

    log::info!("ARNU listener starting");

    if let Err(why) = listener::run(&configuration).await {
        log::error!("{why}");
        process::exit(1);
    }
}
