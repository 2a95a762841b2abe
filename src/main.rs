extern crate clap;
extern crate flockgate;
#[macro_use]
extern crate slog;
extern crate sloggers;
#[macro_use]
extern crate trackable;

use clap::{App, Arg, ArgMatches, SubCommand};
use sloggers::Build;
use trackable::error::Failure;

use flockgate::{GatewayConfig, Result};

mod build_information {
    include!(concat!(env!("OUT_DIR"), "/build_information.rs"));
}

fn main() {
    let matches = App::new("flockgate")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(
            SubCommand::with_name("check-config").arg(
                Arg::with_name("CONFIG_FILE")
                    .long("config")
                    .takes_value(true)
                    .required(true),
            ),
        )
        .arg(
            Arg::with_name("LOGLEVEL")
                .short("l")
                .long("loglevel")
                .takes_value(true)
                .possible_values(&["debug", "info", "warning"])
                .default_value("info"),
        )
        .arg(
            Arg::with_name("MAX_CONCURRENT_LOGS")
                .long("max_concurrent_logs")
                .takes_value(true)
                .default_value("4096"),
        )
        .get_matches();

    // Logger
    let loglevel = match matches.value_of("LOGLEVEL").unwrap() {
        "debug" => sloggers::types::Severity::Debug,
        "info" => sloggers::types::Severity::Info,
        "warning" => sloggers::types::Severity::Warning,
        _ => unreachable!(),
    };
    let max_concurrent_logs = track_try_unwrap!(matches
        .value_of("MAX_CONCURRENT_LOGS")
        .unwrap()
        .parse()
        .map_err(Failure::from_error));
    let mut builder = sloggers::terminal::TerminalLoggerBuilder::new();
    builder.level(loglevel);
    builder.channel_size(max_concurrent_logs);
    let logger = track_try_unwrap!(builder.build());

    // SubCommands
    if let Some(matches) = matches.subcommand_matches("check-config") {
        let config = track_try_unwrap!(load_config(matches));
        info!(
            logger,
            "Configuration is valid";
            "default_copies" => config.default_copies,
            "max_copies" => config.max_copies,
            "max_nodes" => config.max_nodes,
            "max_retry_count" => config.max_retry_count,
            "poll_timeout_millis" => config.poll_timeout.as_millis() as u64,
            "enable_object_cache" => config.enable_object_cache,
            "readonly_ranges" => format!("{:?}", config.readonly_ranges),
            "build_profile" => build_information::BUILD_PROFILE,
            "build_version" => build_information::BUILD_VERSION
        );
    } else {
        println!("{}", matches.usage());
        std::process::exit(1);
    }
}

fn load_config(matches: &ArgMatches) -> Result<GatewayConfig> {
    let path = matches.value_of("CONFIG_FILE").unwrap();
    track!(GatewayConfig::from_yaml_file(path), "path={:?}", path)
}
