// src/main.rs - Host binary: run the slider task, post-process telemetry, inspect config
use clap::{Parser, Subcommand};
use slider_rs::config::{self, Config};
use slider_rs::motion::{ControlVariant, SliderSettings, SliderTask, TaskReport};
use slider_rs::scheduler::{StdTimeSync, TimeInterface};
use slider_rs::simulator::{SimClock, SimulatedArm};
use slider_rs::telemetry::{self, report};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Slider host CLI
#[derive(Parser, Debug)]
#[command(
    name = "slider-host",
    about = "Compliant sliding-axis task with a velocity-dependent lateral force field."
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the slider task against the simulated arm until Ctrl-C
    Run {
        /// Path to a TOML config file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Disable the force field and only hold the arm on the segment
        #[arg(long)]
        passive: bool,

        /// Stop after this many sliding iterations
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Advance simulated time instead of sleeping
        #[arg(long)]
        sim_clock: bool,

        /// Do not write a telemetry file
        #[arg(long)]
        no_telemetry: bool,
    },
    /// Convert a telemetry CSV into a tab-separated report
    ParseLog {
        file: PathBuf,

        /// Output path (default: <file stem>_parsed.txt next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON
    ShowConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Run {
            config,
            passive,
            max_iterations,
            sim_clock,
            no_telemetry,
        } => {
            let mut config = load(config.as_deref())?;
            if no_telemetry {
                config.telemetry.enabled = false;
            }
            let mut settings =
                SliderSettings::from_config(&config).with_iteration_limit(max_iterations);
            if passive {
                settings = settings.with_variant(ControlVariant::PassiveHold);
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, stopping after the current iteration");
                    on_interrupt.cancel();
                }
            });

            let report = if sim_clock {
                run_task(SimClock::new(), &config, settings, cancel).await?
            } else {
                run_task(StdTimeSync, &config, settings, cancel).await?
            };
            println!(
                "Finished after {} iterations ({:?})",
                report.iterations, report.exit
            );
        }
        Commands::ParseLog { file, output } => {
            report::convert(&file, output.as_deref())?;
        }
        Commands::ShowConfig { config } => {
            let config = load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn load(path: Option<&Path>) -> Result<Config, BoxError> {
    let config = match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            config::load_config(&path.to_string_lossy())?
        }
        None => {
            tracing::info!("No config file given, using defaults");
            Config::default()
        }
    };
    for warning in config.validate()? {
        tracing::warn!("Configuration warning: {}", warning);
    }
    Ok(config)
}

async fn run_task<T>(
    clock: T,
    config: &Config,
    settings: SliderSettings,
    cancel: CancellationToken,
) -> Result<TaskReport, BoxError>
where
    T: TimeInterface + Clone + 'static,
{
    let arm = SimulatedArm::new(&config.simulation, clock.clone());
    let telemetry = telemetry::open_or_warn(&config.telemetry, chrono::Local::now());

    let handle = tokio::task::spawn_blocking(move || {
        let mut task = SliderTask::new(arm, clock, settings);
        if let Some(sink) = telemetry {
            task = task.with_telemetry(sink);
        }
        task.run(&cancel)
    });
    Ok(handle.await??)
}
