use std::{process, sync::Arc};

use clap::Parser;
use log::{error, info};

use voluntrack::{
    App, Cli, Config, FileStore, GoogleGeocoder, OpportunityStore, Result, SessionStore,
};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    info!("Using data directory {}", config.data_dir.display());

    let kv = Arc::new(FileStore::new(&config.data_dir));
    let geocoder = Arc::new(GoogleGeocoder::new(
        &config.geocoding_base_url,
        config.get_geocoding_api_key(),
        config.geocoding_timeout(),
    ));

    let store = OpportunityStore::new(kv.clone(), geocoder, config.store_options());
    let session = SessionStore::new(kv);

    App::new(store, session, config, cli.config, cli.verbose)
        .run(cli.command)
        .await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    info!("Application shutting down");
}
