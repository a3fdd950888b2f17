//! Deskbar - standing desk status item.
//!
//! Shows the current desk height, turns slider and preset gestures into
//! controller invocations, and refreshes the reading in the background.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use deskbar_core::HeightTracker;
use deskbar_runner::{CommandRunner, ProcessRunner};
use deskbar_scheduler::{spawn_poller, spawn_serializer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod signals;

use config::{Config, LogFormat, load_config};
use console::{ConsolePresenter, spawn_stdin_reader};
use signals::SignalEvent;

/// Workspace crates that follow the configured log level.
const LOG_TARGETS: &[&str] = &["deskbar", "deskbar_core", "deskbar_runner", "deskbar_scheduler"];

#[derive(Debug, Parser)]
#[command(name = "deskbar", version, about = "Standing desk status item")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Controller executable, overriding the configured one
    #[arg(long, value_name = "PATH")]
    executable: Option<PathBuf>,

    /// Log level, overriding the configured one
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Disable background height refresh
    #[arg(long)]
    no_poll: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(executable) = &self.executable {
            config.controller.executable.clone_from(executable);
        }
        if let Some(level) = &self.log_level {
            config.daemon.log_level.clone_from(level);
        }
    }

    /// Load, override and validate the configuration.
    fn load(&self) -> Result<Config> {
        let mut config = load_config(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn init_logging(config: &Config) -> Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}={}", config.daemon.log_level).parse()?);
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match config.daemon.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load()?;
    init_logging(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Deskbar");

    let process_runner = Arc::new(ProcessRunner::new(config.controller.executable.clone()));
    if let Err(e) = process_runner.check_executable() {
        error!(error = %e, "Desk controller unavailable");
    }
    let runner: Arc<dyn CommandRunner> = process_runner.clone();

    let tracker = HeightTracker::new();
    let shutdown = CancellationToken::new();

    let (serializer, serializer_task) = spawn_serializer(
        runner,
        tracker.clone(),
        config.serializer_settings(),
        shutdown.clone(),
    );

    // Read the height right away so a missing controller shows at launch.
    serializer.submit_query();

    let poller = if cli.no_poll {
        info!("Background refresh disabled");
        None
    } else {
        Some(spawn_poller(serializer.clone(), config.timing.poll_interval(), &shutdown))
    };

    let mut signal_rx = signals::setup_signal_handlers()?;

    let presenter = ConsolePresenter::new(
        serializer.clone(),
        tracker.clone(),
        config.presets.clone(),
        config.height_range()?,
        shutdown.clone(),
    );
    let input = spawn_stdin_reader()?;
    let presenter_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        presenter.run(input, &mut stdout).await
    });

    info!("Deskbar running. Press Ctrl+C to exit.");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,

            Some(event) = signal_rx.recv() => match event {
                SignalEvent::Shutdown => {
                    info!("Shutdown signal received");
                    shutdown.cancel();
                }
                SignalEvent::Reload => match cli.load() {
                    Ok(reloaded) => {
                        // Timing, presets and range take effect on restart.
                        process_runner.set_executable(reloaded.controller.executable);
                        serializer.resume();
                        info!("Configuration reloaded");
                    }
                    Err(e) => error!(error = %e, "Failed to reload configuration"),
                },
            },
        }
    }

    info!("Shutting down...");
    if let Some(poller) = poller {
        poller.stop().await;
    }
    if let Err(e) = serializer_task.await {
        warn!(error = %e, "Serializer task ended abnormally");
    }
    match presenter_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Presenter failed"),
        Err(e) => warn!(error = %e, "Presenter task ended abnormally"),
    }

    info!("Deskbar stopped");
    Ok(())
}
