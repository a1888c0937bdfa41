use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use gs_app::{AppError, AppResult, RecorderEvent, Supervisor, build_transport, load_checked, read_once};
use gs_telemetry::{MeasurementDescriptor, decode, is_signed_address};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gs-cli")]
#[command(about = "Genset CLI - generator telemetry logger and governor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and its measurement descriptors
    Validate {
        /// Path to the config YAML file
        config_path: PathBuf,
    },
    /// Poll every measurement once and print the values
    Read {
        /// Path to the config YAML file
        config_path: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Decode raw register words offline
    Decode {
        /// Register words, high word first (decimal or 0x hex)
        #[arg(long, value_delimiter = ',', value_parser = parse_word, required = true)]
        words: Vec<u16>,
        /// Treat the value as two's complement
        #[arg(long)]
        signed: bool,
        /// Look up signedness for this register address
        #[arg(long)]
        address: Option<u16>,
        #[arg(long, default_value_t = 1.0)]
        gain: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        offset: f64,
    },
    /// Run telemetry, control, and recording until stopped
    Run {
        /// Path to the config YAML file
        config_path: PathBuf,
        /// Stop after this many seconds
        #[arg(long, value_parser = parse_seconds)]
        duration: Option<Duration>,
        /// Write CSV records to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_word(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid register word '{s}': {e}"))
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|e| format!("invalid duration '{s}': {e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration '{s}': {e}"))
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Read { config_path, json } => cmd_read(&config_path, json),
        Commands::Decode {
            words,
            signed,
            address,
            gain,
            offset,
        } => cmd_decode(&words, signed, address, gain, offset),
        Commands::Run {
            config_path,
            duration,
            output,
        } => cmd_run(&config_path, duration, output.as_deref()),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating config: {}", config_path.display());
    let (config, descriptors) = load_checked(config_path)?;
    println!("✓ Config is valid");
    println!("  Measurements: {}", descriptors.len());
    match &config.control {
        Some(control) => println!(
            "  Governor: {} -> setpoint {} (kp {}, ki {}, kd {})",
            control.process_variable, control.setpoint, control.kp, control.ki, control.kd
        ),
        None => println!("  Governor: disabled"),
    }
    Ok(())
}

fn cmd_read(config_path: &Path, json: bool) -> AppResult<()> {
    let (config, descriptors) = load_checked(config_path)?;
    let transport = build_transport(&config.telemetry);
    let snapshot = read_once(&config, descriptors, transport)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", snapshot.render_table());
    }
    Ok(())
}

fn cmd_decode(words: &[u16], signed: bool, address: Option<u16>, gain: f64, offset: f64) -> AppResult<()> {
    let word_count = u16::try_from(words.len())
        .map_err(|_| AppError::Config("too many register words".to_string()))?;
    let signed = signed || address.is_some_and(is_signed_address);
    let descriptor = MeasurementDescriptor::new(
        "decode",
        "",
        address.unwrap_or(0),
        word_count,
        gain,
        offset,
        None,
    )
    .map_err(gs_telemetry::TelemetryError::from)?
    .with_signed(signed);
    let value = decode(&descriptor, words).map_err(gs_telemetry::TelemetryError::from)?;
    println!("{value}");
    Ok(())
}

fn cmd_run(config_path: &Path, duration: Option<Duration>, output: Option<&Path>) -> AppResult<()> {
    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };
    // A deadline past what `Instant` can hold means run until stopped.
    let deadline = duration.and_then(|d| Instant::now().checked_add(d));

    info!(config = %config_path.display(), ?duration, "starting run");
    let supervisor = Supervisor::start(config_path)?;
    let result = pump_records(&supervisor, sink.as_mut(), deadline, output.is_some());
    let clean = supervisor.stop();
    sink.flush()?;
    result?;
    if !clean {
        return Err(AppError::Worker("a worker stopped abnormally".to_string()));
    }
    Ok(())
}

fn pump_records(
    supervisor: &Supervisor,
    sink: &mut dyn Write,
    deadline: Option<Instant>,
    to_file: bool,
) -> AppResult<()> {
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(());
        }
        match supervisor.records().recv_timeout(Duration::from_millis(100)) {
            Ok(RecorderEvent::Header(line) | RecorderEvent::Row(line)) => {
                writeln!(sink, "{line}")?;
                if to_file {
                    sink.flush()?;
                }
            }
            Ok(RecorderEvent::Display(text)) => {
                if to_file {
                    print!("{text}");
                } else {
                    eprint!("{text}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_words() {
        assert_eq!(parse_word("250"), Ok(250));
        assert_eq!(parse_word("0xFFFF"), Ok(0xFFFF));
        assert!(parse_word("70000").is_err());
    }

    #[test]
    fn duration_rejects_values_a_timer_cannot_hold() {
        assert_eq!(parse_seconds("1.5"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_seconds("0"), Ok(Duration::ZERO));
        assert!(parse_seconds("inf").is_err());
        assert!(parse_seconds("1e20").is_err());
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("NaN").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn run_duration_goes_through_parser() {
        let cli = Cli::try_parse_from(["gs-cli", "run", "genset.yaml", "--duration", "2"]).unwrap();
        let Commands::Run { duration, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(duration, Some(Duration::from_secs(2)));
        assert!(Cli::try_parse_from(["gs-cli", "run", "genset.yaml", "--duration", "inf"]).is_err());
    }
}
