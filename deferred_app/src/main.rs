//! Deferred shading demo application
//!
//! Renders nine instances of a ship lit by fourteen point lights and switches
//! between deferred and forward shading at runtime.
//!
//! Controls: WASD/QE to fly, mouse to look, scroll to zoom, `1` toggles the
//! pipeline, `2` toggles rotation, Escape quits.

use std::path::Path;
use std::process::ExitCode;

use clap::{value_parser, Arg, ArgMatches, Command};
use deferred_engine::foundation::logging;
use deferred_engine::prelude::*;

/// Loaded when `--config` is not given and the file exists
const DEFAULT_CONFIG_PATH: &str = "config/deferred_demo.toml";

fn command() -> Command {
    Command::new("deferred_demo")
        .about("Forward vs deferred point-light shading demo")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file (.toml or .ron)"),
        )
        .arg(
            Arg::new("profile")
                .short('p')
                .long("profile")
                .value_name("PROFILE")
                .help("Window size profile")
                .value_parser(["desktop", "compact"]),
        )
        .arg(
            Arg::new("headless")
                .long("headless")
                .value_name("FRAMES")
                .help("Render FRAMES frames without a window or GPU and exit")
                .value_parser(value_parser!(u32)),
        )
}

fn load_config(matches: &ArgMatches) -> Result<DemoConfig, AppError> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            log::info!("Loading configuration from {path}");
            DemoConfig::load_from_file(path)?
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            log::info!("Loading configuration from {DEFAULT_CONFIG_PATH}");
            DemoConfig::load_from_file(DEFAULT_CONFIG_PATH)?
        }
        None => {
            log::info!("No configuration file; using defaults");
            DemoConfig::default()
        }
    };

    if let Some(profile) = matches.get_one::<String>("profile") {
        config = config.with_profile(profile.parse()?);
    }
    Ok(config)
}

fn run(matches: &ArgMatches) -> Result<(), AppError> {
    let config = load_config(matches)?;

    if let Some(&frames) = matches.get_one::<u32>("headless") {
        let report = run_headless(&config, frames)?;
        log::info!("{report:?}");
        return Ok(());
    }

    DeferredDemo::new(&config)?.run();
    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    log::info!("Starting deferred shading demo");

    let matches = command().get_matches();
    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
