// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use prefixd::Daemon;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("Usage: prefixd <config.yml>");
            std::process::exit(1);
        }
    };

    log::info!(
        "Starting {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = Daemon::run(Path::new(&config_path)) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
