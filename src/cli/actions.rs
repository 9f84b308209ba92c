use anyhow::{anyhow, bail, Result};
use clap::ArgMatches;
use std::{
    io::{BufRead, Write},
    sync::Arc,
};
use tokio::time::Instant;

use super::config::DashboardConfig;
use crate::{
    core::{
        bus::{console_message, Bus, UiToCore},
        catalog::DeviceCatalog,
        intent::{Intent, INTENT_USAGE},
        persistence::load_catalog,
        render::render_matrix_text,
        session::Session,
        settings::DashboardSettings,
        transport::{HttpProxyTransport, RelayTransport},
    },
    protocol::{
        codec::{decode_matrix_report, decode_states_report, find_section, SectionKind},
        matrix::Matrix,
    },
    server::{self, ServerState},
    utils::sleep::sleep_1s,
};

/// Dispatch the parsed command line.
pub fn run(matches: &ArgMatches) -> Result<()> {
    let config = DashboardConfig::from_matches(matches)?;
    log::debug!("Effective configuration:\n{}", config.to_json()?);

    match matches.subcommand() {
        Some(("serve", _)) => run_serve(&config),
        Some(("dashboard", _)) | None => run_dashboard(&config),
        Some(("states", sub)) => run_states(&config, sub),
        Some(("matrix", sub)) => run_matrix(&config, sub),
        Some(("send", sub)) => run_send(&config, sub),
        Some((other, _)) => bail!("Unknown subcommand {other}"),
    }
}

fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to create tokio runtime: {e}"))
}

fn transport_for(config: &DashboardConfig) -> Arc<HttpProxyTransport> {
    let timings = config.timings();
    Arc::new(HttpProxyTransport::new(
        &config.proxy_url,
        timings.request_timeout,
        timings.probe_timeout,
    ))
}

fn required_ip(sub: &ArgMatches) -> Result<String> {
    sub.get_one::<String>("ip")
        .cloned()
        .ok_or_else(|| anyhow!("--ip is required"))
}

fn run_serve(config: &DashboardConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to create tokio runtime: {e}"))?;
    let state = ServerState::new(
        config.data_dir.clone(),
        config.timings().request_timeout,
    );
    runtime.block_on(server::serve(config.port, state))
}

fn print_help() {
    println!("Commands:");
    for usage in INTENT_USAGE {
        println!("  {usage}");
    }
    println!("  show | help | quit");
}

/// Read console lines on a plain thread so a blocked stdin never holds up
/// runtime shutdown.
fn spawn_console_reader(ui_tx: flume::Sender<UiToCore>) -> Result<()> {
    std::thread::Builder::new()
        .name("console-input".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match console_message(&line) {
                    Ok(Some(message)) => {
                        if ui_tx.send(message).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => eprintln!("{err:#}"),
                }
            }
            let _ = ui_tx.send(UiToCore::Quit);
        })
        .map_err(|e| anyhow!("Failed to spawn console reader: {e}"))?;
    Ok(())
}

fn redraw(session: &Session) -> u64 {
    let frame = session.render(Instant::now());
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "\n{frame}");
    let _ = write!(stdout, "> ");
    let _ = stdout.flush();
    session.view().read().revision()
}

fn run_dashboard(config: &DashboardConfig) -> Result<()> {
    let runtime = current_thread_runtime()?;
    runtime.block_on(async {
        let session = Session::load(&config.data_dir, transport_for(config), config.timings())?;
        let bus = Bus::new();
        spawn_console_reader(bus.ui_tx.clone())?;

        session.start();
        print_help();
        let mut drawn = redraw(&session);

        loop {
            tokio::select! {
                message = bus.core_rx.recv_async() => match message {
                    Ok(UiToCore::Intent(intent)) => {
                        session.handle(intent).await;
                        drawn = redraw(&session);
                    }
                    Ok(UiToCore::Refresh) => drawn = redraw(&session),
                    Ok(UiToCore::Help) => print_help(),
                    Ok(UiToCore::Quit) | Err(_) => break,
                },
                _ = sleep_1s() => {
                    if session.view().read().revision() != drawn {
                        drawn = redraw(&session);
                    }
                }
            }
        }

        session.shutdown();
        log::info!("Dashboard closed");
        Ok(())
    })
}

fn run_states(config: &DashboardConfig, sub: &ArgMatches) -> Result<()> {
    let ip = required_ip(sub)?;
    let transport = transport_for(config);
    let raw = current_thread_runtime()?.block_on(transport.fetch_states(&ip))?;

    if find_section(&raw, SectionKind::Output).is_none() {
        log::warn!("Could not parse output section from states for {ip}");
    }
    for kind in [SectionKind::Output, SectionKind::Input] {
        println!("{kind}s:");
        for (number, on) in decode_states_report(&raw, kind) {
            println!("  {number:>2}: {}", if on { "on" } else { "off" });
        }
    }
    Ok(())
}

fn run_matrix(config: &DashboardConfig, sub: &ArgMatches) -> Result<()> {
    let ip = required_ip(sub)?;
    let transport = transport_for(config);
    let raw = current_thread_runtime()?.block_on(transport.fetch_matrix(&ip))?;
    let matrix = Matrix::from_rows(&decode_matrix_report(&raw));

    // Names are optional here; fall back to plain numbering.
    let catalog = load_catalog(&config.data_dir).unwrap_or_else(|err| {
        log::debug!("Showing matrix without device names: {err:#}");
        DeviceCatalog::default()
    });
    let settings = DashboardSettings::load(&config.data_dir);
    print!("{}", render_matrix_text(&catalog, &settings, &ip, &matrix));
    Ok(())
}

fn run_send(config: &DashboardConfig, sub: &ArgMatches) -> Result<()> {
    let address = required_ip(sub)?;
    let number = *sub
        .get_one::<u8>("number")
        .ok_or_else(|| anyhow!("--number is required"))?;
    let intent = match sub.get_one::<String>("state").map(String::as_str) {
        Some("on") => Intent::Toggle {
            address,
            number,
            on: true,
        },
        Some("off") => Intent::Toggle {
            address,
            number,
            on: false,
        },
        Some("trigger") => Intent::Trigger { address, number },
        other => bail!("Unsupported state {other:?}"),
    };

    current_thread_runtime()?.block_on(async {
        let session = Session::load(&config.data_dir, transport_for(config), config.timings())?;
        let ok = session.handle(intent).await;

        let view = session.view().read();
        if let Some(status) = view.status() {
            println!("{}", status.message);
        }
        if !view.response().is_empty() {
            println!("{}", view.response());
        }
        if ok {
            Ok(())
        } else {
            Err(anyhow!("Command failed"))
        }
    })
}
