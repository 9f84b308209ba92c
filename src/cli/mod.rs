pub mod actions;
pub mod config;

use clap::{Arg, ArgMatches, Command};

fn ip_arg() -> Arg {
    Arg::new("ip")
        .long("ip")
        .help("Address of the relay board")
        .value_name("IP")
        .required(true)
}

/// Build the command line definition.
pub fn build_command() -> Command {
    Command::new("relaydeck")
        .about("Local dashboard and same-origin proxy for HTTP relay boards")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON configuration file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also write log records to this file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .short('d')
                .help("Directory holding devices.json and the other configuration files")
                .value_name("DIR")
                .global(true),
        )
        .arg(
            Arg::new("proxy")
                .long("proxy")
                .help("Base URL of the proxy server")
                .value_name("URL")
                .global(true),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the proxy server (forwarding, config saves, static files)")
                .arg(
                    Arg::new("port")
                        .long("port")
                        .short('p')
                        .help("Port to listen on")
                        .value_name("PORT")
                        .value_parser(clap::value_parser!(u16)),
                ),
        )
        .subcommand(
            Command::new("dashboard")
                .about("Interactive console dashboard (default when no subcommand is given)"),
        )
        .subcommand(
            Command::new("states")
                .about("Fetch and decode the states report of one board")
                .arg(ip_arg()),
        )
        .subcommand(
            Command::new("matrix")
                .about("Fetch and show the interconnection matrix of one board")
                .arg(ip_arg()),
        )
        .subcommand(
            Command::new("send")
                .about("Send one command to a configured device")
                .arg(ip_arg())
                .arg(
                    Arg::new("number")
                        .long("number")
                        .short('n')
                        .help("Device number (0-23)")
                        .value_name("N")
                        .required(true)
                        .value_parser(clap::value_parser!(u8).range(0..=23)),
                )
                .arg(
                    Arg::new("state")
                        .long("state")
                        .short('s')
                        .help("What to do with the output")
                        .value_name("STATE")
                        .required(true)
                        .value_parser(["on", "off", "trigger"]),
                ),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    build_command().get_matches()
}
