use chrono::Local;
use log::LevelFilter;
use std::io::{self, Write};

use env_logger::{Builder, Target};

/// Multi-writer for logging to both file and stdout
struct DualWriter {
    file: std::fs::File,
    stdout: io::Stdout,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        self.stdout.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.stdout.flush()?;
        Ok(())
    }
}

/// Pick the log file: the `--log-file` flag first, then `RELAYDECK_LOG_FILE`.
fn log_file_path(flag: Option<&str>) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| std::env::var("RELAYDECK_LOG_FILE").ok())
        .filter(|p| !p.is_empty())
}

/// Logger setup for every subcommand.
///
/// The proxy server tees records to the terminal as well; the interactive
/// dashboard and the one-shot commands only write to the file so log lines
/// do not interleave with their output.
pub fn init_logging(log_file: Option<&str>, tee_to_stdout: bool) {
    let Some(path) = log_file_path(log_file) else {
        env_logger::init();
        return;
    };

    let result = if tee_to_stdout {
        init_server_logger(&path)
    } else {
        init_file_logger(&path)
    };
    if let Err(err) = result {
        eprintln!("Failed to initialize file logger at '{path}': {err}");
        env_logger::init();
    }
}

/// Initialize dual logger for server mode (outputs to both file and terminal)
fn init_server_logger(path: &str) -> io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let dual_writer = DualWriter {
        file,
        stdout: io::stdout(),
    };

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(dual_writer)))
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("Server logger initialized - logging to {path} and terminal");

    Ok(())
}

fn init_file_logger(path: &str) -> io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)))
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .init();

    log::info!("File logger initialized at {path}");

    Ok(())
}
