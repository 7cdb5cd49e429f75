//! Batch binary: run the whole pipeline for one config file.
//!
//! ```text
//! importer --config=data/xian.json [--output=dir]
//! ```

use gridutil::{CmdArgs, Timer};

fn main() {
    let mut args = CmdArgs::new();
    let config_path = args.required("--config");
    // Overrides the config's output_dir.
    let output_dir = args.optional("--output");
    args.done();

    let mut config = match emissions::Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(err.exit_code());
        }
    };
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let mut timer = Timer::new(format!("import {}", config_path));
    if let Err(err) = emissions::pipeline::run(&config, &mut timer) {
        log::error!("{}", err);
        std::process::exit(err.exit_code());
    }
}
