use anyhow::Result;

fn main() -> Result<()> {
    let matches = relaydeck::cli::parse_args();
    let serving = matches!(matches.subcommand(), Some(("serve", _)));
    relaydeck::boot::init_logging(
        matches.get_one::<String>("log-file").map(String::as_str),
        serving,
    );

    relaydeck::cli::actions::run(&matches)
}
