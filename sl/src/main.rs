//! SortLine - three-stage cube sorting line
//!
//! CLI entry point for running the line, checking devices and driving the
//! light observers.

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use sortline::cli::{Cli, Command};
use sortline::config::Config;
use sortline::coordinator::{LineState, RunControl};
use sortline::device::{Devices, LightDevices, discover_things, role_report};
use sortline::lights::run_observers;
use sortline::line::{Line, LineReport};
use sortline::sim::SimLine;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).context("Failed to create log directory")?;
            }
            let file = fs::File::create(path).context("Failed to create log file")?;
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level and file from config early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    let log_file = Config::load(cli.config.as_ref()).ok().and_then(|c| c.log_file);

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), log_file.as_deref())
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run { simulate, directory }) => {
            debug!(simulate, ?directory, "main: matched Run command");
            cmd_run(config, simulate, directory.as_deref()).await
        }
        Some(Command::Devices { directory }) => {
            debug!(?directory, "main: matched Devices command");
            cmd_devices(&config, directory.as_deref()).await
        }
        Some(Command::Lights { directory }) => {
            debug!(?directory, "main: matched Lights command");
            cmd_lights(&config, directory.as_deref()).await
        }
        Some(Command::Config) => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
        None => {
            debug!("main: no command, defaulting to simulated run");
            cmd_run(config, true, None).await
        }
    }
}

/// Stop the run on SIGINT or SIGTERM, or when the run stops by itself
async fn watch_signals(run: RunControl) -> Result<()> {
    debug!("watch_signals: called");
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("SIGINT received, stopping line");
                run.stop(LineState::Interrupted);
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, stopping line");
                run.stop(LineState::Interrupted);
            }
            _ = run.stopped() => {
                debug!("watch_signals: run stopped");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Ctrl-C received, stopping line");
                run.stop(LineState::Interrupted);
            }
            _ = run.stopped() => {
                debug!("watch_signals: run stopped");
            }
        }
    }

    Ok(())
}

async fn cmd_run(config: Config, simulate: bool, directory: Option<&str>) -> Result<()> {
    debug!(simulate, ?directory, "cmd_run: called");
    let sim = simulate.then(|| SimLine::new(&config));
    let things = match &sim {
        Some(sim) => {
            info!("Running against the simulated line");
            sim.things()
        }
        None => discover_things(&config, directory)
            .await
            .context("Device discovery failed")?,
    };
    let devices = Devices::register(&config.devices, things).context("Device registration failed")?;

    let line = Line::new(devices, config);
    let run = line.run_control();
    let signals = tokio::spawn(watch_signals(run.clone()));

    let report = line.run().await?;
    signals.abort();

    print_report(&report);
    if let Some(sim) = &sim {
        println!(
            "Simulated line released {} cube(s), lost {}",
            sim.released().len(),
            sim.lost()
        );
    }
    Ok(())
}

fn print_report(report: &LineReport) {
    println!("Line {}", report.state.to_string().bold());
    for (color, count) in &report.sorted {
        println!("  {:<8} {}", color.to_string(), count);
    }
    for stage in &report.stages {
        let failures = if stage.failures > 0 {
            stage.failures.to_string().yellow()
        } else {
            stage.failures.to_string().normal()
        };
        println!("  {:<8} cycles={} failures={}", stage.stage, stage.cycles, failures);
    }
}

async fn cmd_devices(config: &Config, directory: Option<&str>) -> Result<()> {
    debug!(?directory, "cmd_devices: called");
    let things = discover_things(config, directory)
        .await
        .context("Device discovery failed")?;
    let titles: Vec<String> = things.iter().map(|t| t.title().to_string()).collect();

    for (title, required, found) in role_report(&config.devices, &titles) {
        let mark = if found { "✓".green() } else if required { "✗".red() } else { "-".dimmed() };
        let kind = if required { "required" } else { "optional" };
        println!("{} {:<28} {}", mark, title, kind.dimmed());
    }

    let missing = config.devices.required().iter().filter(|r| !titles.iter().any(|t| t == *r)).count();
    if missing > 0 {
        println!("{}", format!("{} required device(s) missing", missing).red());
    }
    Ok(())
}

async fn cmd_lights(config: &Config, directory: Option<&str>) -> Result<()> {
    debug!(?directory, "cmd_lights: called");
    let things = discover_things(config, directory)
        .await
        .context("Device discovery failed")?;
    let devices = LightDevices::register(&config.devices, things).context("Light registration failed")?;

    let run = RunControl::new();
    let signals = tokio::spawn(watch_signals(run.clone()));
    run_observers(devices, Duration::from_millis(config.lights.poll_ms), run).await?;
    signals.abort();
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
