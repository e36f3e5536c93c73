//! Samctl CLI - Command-line control for the SAM robotic arm
//!
//! Sends single commands, validates and plays `.sams` scripts, and lists
//! serial ports, with exit codes suitable for automation.

use clap::{Parser, Subcommand, ValueEnum};
use samctl_core::cli::print_exit_codes;
use samctl_core::core::transport::list_ports;
use samctl_core::{
    Actuator, AppConfig, CliResult, Command, ControllerEvent, Direction, Dispatcher, ExitCodes,
    PlaybackReport, PlaybackStatus, Script,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// CLI output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format for scripting
    Json,
}

/// Joint selector
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActuatorArg {
    /// Shoulder joint (stepped)
    Shoulder,
    /// Elbow joint (stepped)
    Elbow,
    /// Base rotation (stepped)
    Base,
    /// Wrist pitch servo (absolute angle)
    WristPitch,
    /// Wrist roll servo (absolute angle)
    WristRoll,
}

impl ActuatorArg {
    fn actuator(self) -> Actuator {
        match self {
            Self::Shoulder => Actuator::Shoulder,
            Self::Elbow => Actuator::Elbow,
            Self::Base => Actuator::Base,
            Self::WristPitch => Actuator::WristPitch,
            Self::WristRoll => Actuator::WristRoll,
        }
    }
}

/// Movement direction
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// Positive direction (up / right)
    Positive,
    /// Negative direction (down / left)
    Negative,
}

impl DirectionArg {
    fn direction(self) -> Direction {
        match self {
            Self::Positive => Direction::Positive,
            Self::Negative => Direction::Negative,
        }
    }
}

/// Samctl CLI
#[derive(Parser, Debug)]
#[command(
    name = "samctl",
    author = "samctl developers",
    version = "0.1.0",
    about = "Command-line control for the SAM robotic arm",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Use the synthetic debug link instead of probing hardware
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    Ports {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Send one raw wire command (e.g. s_10_1_n, gn, Zn)
    Send {
        /// Wire-form command text
        command: String,
    },

    /// Step a joint (shoulder, elbow or base)
    Move {
        /// Joint to move
        #[arg(value_enum)]
        actuator: ActuatorArg,

        /// Direction of the step
        #[arg(value_enum)]
        direction: DirectionArg,

        /// Step size in degrees (defaults to the configured step)
        #[arg(short, long)]
        degrees: Option<u32>,
    },

    /// Set a wrist servo to an absolute angle (0-180)
    Angle {
        /// Servo to set
        #[arg(value_enum)]
        actuator: ActuatorArg,

        /// Target angle in degrees
        degrees: u32,
    },

    /// Toggle the claw
    Grab,

    /// Return every joint to its home posture
    Reset,

    /// Play a .sams script
    Play {
        /// Script file path
        script: PathBuf,
    },

    /// Validate a .sams script without connecting
    Check {
        /// Script file path
        script: PathBuf,
    },

    /// Print the exit code table
    ExitCodes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(&cli).await;

    match &result {
        CliResult::Success(Some(msg)) => println!("{}", msg),
        CliResult::Success(None) => {}
        CliResult::Error(_, msg) => eprintln!("Error: {}", msg),
    }
    result.to_exit_code()
}

async fn run(cli: &Cli) -> CliResult {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => return CliResult::error(ExitCodes::CONFIG_ERROR, err.to_string()),
    };

    match &cli.command {
        Commands::Ports { detailed } => show_ports(cli, *detailed),
        Commands::Send { command } => match Command::decode(command) {
            Ok(command) => send_one(cli, &config, command).await,
            Err(err) => err.into(),
        },
        Commands::Move {
            actuator,
            direction,
            degrees,
        } => {
            let degrees = degrees.unwrap_or(config.control.step_degrees);
            match Command::step(actuator.actuator(), degrees, direction.direction()) {
                Ok(command) => send_one(cli, &config, command).await,
                Err(err) => CliResult::error(ExitCodes::INVALID_ARGS, err.to_string()),
            }
        }
        Commands::Angle { actuator, degrees } => {
            match Command::angle(actuator.actuator(), *degrees) {
                Ok(command) => send_one(cli, &config, command).await,
                Err(err) => CliResult::error(ExitCodes::INVALID_ARGS, err.to_string()),
            }
        }
        Commands::Grab => send_one(cli, &config, Command::Grab).await,
        Commands::Reset => send_one(cli, &config, Command::Reset).await,
        Commands::Play { script } => play_script(cli, &config, script).await,
        Commands::Check { script } => check_script(cli, script),
        Commands::ExitCodes => {
            print_exit_codes();
            CliResult::success()
        }
    }
}

/// Attach a transport: the debug link on request, otherwise the configured
/// probe list.
async fn connect(cli: &Cli, config: &AppConfig, dispatcher: &Dispatcher) -> Result<(), CliResult> {
    if cli.debug {
        dispatcher.open_debug().await;
        return Ok(());
    }
    dispatcher
        .open(&config.connection.candidates)
        .await
        .map(|_| ())
        .map_err(CliResult::from)
}

async fn send_one(cli: &Cli, config: &AppConfig, command: Command) -> CliResult {
    let dispatcher = Dispatcher::new(
        config.connection.baud_rate,
        config.playback.playback_config(),
    );
    if let Err(result) = connect(cli, config, &dispatcher).await {
        return result;
    }
    if let Err(err) = dispatcher.send_immediate(command).await {
        return err.into();
    }

    match cli.format {
        OutputFormat::Json => {
            let json = serde_json::json!({ "sent": command.encode() });
            CliResult::success_with_message(json.to_string())
        }
        OutputFormat::Text if cli.quiet => CliResult::success(),
        OutputFormat::Text => CliResult::success_with_message(format!("Sent {}", command)),
    }
}

async fn play_script(cli: &Cli, config: &AppConfig, path: &Path) -> CliResult {
    let script = match Script::load(path) {
        Ok(script) => script,
        Err(err) => return err.into(),
    };

    let dispatcher = Arc::new(Dispatcher::new(
        config.connection.baud_rate,
        config.playback.playback_config(),
    ));
    if let Err(result) = connect(cli, config, &dispatcher).await {
        return result;
    }

    // Ctrl+C asks the worker to stop at the next safe checkpoint.
    let canceller = dispatcher.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = canceller.cancel_playback();
    }) {
        return CliResult::error(ExitCodes::INTERNAL_ERROR, err.to_string());
    }

    let mut rx = dispatcher.subscribe();
    let handle = match dispatcher.start_playback(script) {
        Ok(handle) => handle,
        Err(err) => return err.into(),
    };

    let quiet = cli.quiet;
    let progress = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ControllerEvent::PlaybackProgress(fraction)) if !quiet => {
                    eprint!("\r{:>5.1}%", fraction * 100.0);
                }
                Ok(ControllerEvent::PlaybackFinished(_)) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                // Long scripts can outrun the channel; skip the gap and
                // keep reading.
                Err(RecvError::Lagged(_)) => {}
            }
        }
        if !quiet {
            eprintln!();
        }
    });

    let report = handle.wait().await;
    let _ = progress.await;

    playback_result(cli, &report)
}

fn playback_result(cli: &Cli, report: &PlaybackReport) -> CliResult {
    match &report.status {
        PlaybackStatus::Completed => match cli.format {
            OutputFormat::Json => CliResult::success_with_message(
                serde_json::json!({
                    "status": "completed",
                    "lines_sent": report.lines_sent,
                    "total_lines": report.total_lines,
                })
                .to_string(),
            ),
            OutputFormat::Text if cli.quiet => CliResult::success(),
            OutputFormat::Text => CliResult::success_with_message(format!(
                "Playback completed: {} lines",
                report.lines_sent
            )),
        },
        PlaybackStatus::Cancelled => CliResult::cancelled(format!(
            "playback cancelled after {} of {} lines",
            report.lines_sent, report.total_lines
        )),
        PlaybackStatus::Failed { message } => CliResult::playback_failed(format!(
            "{} ({} of {} lines sent)",
            message, report.lines_sent, report.total_lines
        )),
    }
}

fn check_script(cli: &Cli, path: &Path) -> CliResult {
    match Script::load(path) {
        Ok(script) => match cli.format {
            OutputFormat::Json => CliResult::success_with_message(
                serde_json::json!({
                    "file": path.display().to_string(),
                    "valid": true,
                    "lines": script.len(),
                })
                .to_string(),
            ),
            OutputFormat::Text => CliResult::success_with_message(format!(
                "{}: {} commands",
                path.display(),
                script.len()
            )),
        },
        Err(err) => err.into(),
    }
}

fn show_ports(cli: &Cli, detailed: bool) -> CliResult {
    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(err) => return CliResult::connection_failed(err.to_string()),
    };

    if ports.is_empty() {
        return match cli.format {
            OutputFormat::Json => CliResult::success_with_message("[]"),
            OutputFormat::Text if cli.quiet => CliResult::success(),
            OutputFormat::Text => CliResult::success_with_message("No serial ports found."),
        };
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            match serde_json::to_string_pretty(&json) {
                Ok(text) => CliResult::success_with_message(text),
                Err(err) => CliResult::error(ExitCodes::INTERNAL_ERROR, err.to_string()),
            }
        }
        OutputFormat::Text => {
            let mut out = String::new();
            if detailed {
                out.push_str("Available Serial Ports:\n");
                out.push_str(&format!("{:-<60}\n", ""));
                for port in &ports {
                    out.push_str(&format!("  {} [{:?}]\n", port.port_name, port.port_type));
                }
            } else {
                for port in &ports {
                    out.push_str(&format!("{}\n", port.port_name));
                }
            }
            CliResult::success_with_message(out.trim_end().to_string())
        }
    }
}
