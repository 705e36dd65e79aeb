use clap::Parser;
use log::info;
use std::path::PathBuf;

use ssl_pubkey_exporter::config::Config;
use ssl_pubkey_exporter::logging::init_logger;
use ssl_pubkey_exporter::{server, APP_NAME, VERSION};

/// Prometheus exporter for TLS public key fingerprints
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Args {
    /// Address to listen on, host:port or :port
    #[arg(long)]
    listen_address: Option<String>,

    /// Probe timeout in seconds when a scrape does not send one
    #[arg(long)]
    default_timeout: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", Config::example_toml());
        return Ok(());
    }

    let mut config = Config::defaults();
    if let Some(path) = &args.config {
        config = config.merge_with(Config::from_file(path)?);
    }
    let settings = config
        .merge_with(Config::from_env())
        .merge_with(Config::from_cli_args(
            args.listen_address,
            args.default_timeout,
            args.log_level,
        ))
        .into_settings()?;

    init_logger(&settings.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);
    if let Some(path) = &args.config {
        info!("Loaded configuration file path={}", path.display());
    }

    server::serve(settings).await?;
    Ok(())
}
