mod config;
mod console;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use relay_logging::{relay_error, relay_info, relay_warn};

fn main() -> ExitCode {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::CONFIG_FILENAME));

    let loaded = config::load(&path);
    let destination = match &loaded {
        Ok(Some(config)) => config.log_destination,
        _ => logging::LogDestination::default(),
    };
    logging::initialize(destination);

    let config = match loaded {
        Ok(Some(config)) => {
            relay_info!("loaded config from {:?}", path);
            config
        }
        Ok(None) => {
            relay_warn!("no config at {:?}, using defaults", path);
            config::AppConfig::default()
        }
        Err(err) => {
            relay_error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match console::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            relay_error!("{err}");
            ExitCode::FAILURE
        }
    }
}
