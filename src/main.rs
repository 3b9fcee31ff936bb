mod app;

use std::path::PathBuf;

use pasture::config::PetConfig;

fn main() {
    env_logger::init();
    log::info!("pasture starting up");

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => match PetConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Fatal error: {e}");
                std::process::exit(1);
            }
        },
        None => PetConfig::default(),
    };

    if let Err(e) = app::run(config) {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
