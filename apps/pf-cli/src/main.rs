use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use pf_project::{ProjectResult, ScenarioReport, load_config, load_scenario, run_scenario};
use pf_pump::{
    Channel, DisplaySnapshot, EventQueue, NozzleState, PumpError, PumpEvent, PumpStation,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pf-cli")]
#[command(about = "PumpFlow CLI - fuel pump propagation graph runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate pump config syntax and values
    Validate {
        /// Path to the config file (YAML, or JSON by extension)
        config_path: PathBuf,
    },
    /// Replay a scenario script against a pump
    Run {
        /// Path to the config file
        config_path: PathBuf,
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lift one nozzle and let the pulse ticker deliver
    Simulate {
        /// Path to the config file
        config_path: PathBuf,
        /// Nozzle to lift (1-3)
        #[arg(long)]
        nozzle: u8,
        /// Number of ticker periods to run
        #[arg(long, default_value_t = 10)]
        ticks: u32,
        /// Sleep one ticker period between ticks
        #[arg(long)]
        realtime: bool,
    },
}

fn main() -> ProjectResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Run {
            config_path,
            scenario_path,
            json,
        } => cmd_run(&config_path, &scenario_path, json),
        Commands::Simulate {
            config_path,
            nozzle,
            ticks,
            realtime,
        } => cmd_simulate(&config_path, nozzle, ticks, realtime),
    }
}

fn cmd_validate(config_path: &Path) -> ProjectResult<()> {
    println!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;
    config.params()?;
    println!("✓ Config is valid ({:?}, version {})", config.variant, config.version);
    Ok(())
}

fn cmd_run(config_path: &Path, scenario_path: &Path, json: bool) -> ProjectResult<()> {
    let config = load_config(config_path)?;
    let scenario = load_scenario(scenario_path)?;
    let report = run_scenario(&config, &scenario)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    println!("Scenario: {} ({} steps)", report.scenario, report.steps_run);
    if report.pulses_ticked > 0 {
        println!("  Ticker pulses: {}", report.pulses_ticked);
    }
    print_display(&report.display);
    if report.passed() {
        println!("✓ All expectations met");
    } else {
        println!("✗ {} expectation(s) failed:", report.failures.len());
        for f in &report.failures {
            println!(
                "  step {}: {} expected {:?}, got {:?}",
                f.step, f.field, f.expected, f.actual
            );
        }
    }
}

fn print_display(display: &DisplaySnapshot) {
    println!(
        "  delivery {:<6} quantity {:>8}  cost {:>8}  prices [{:>6} {:>6} {:>6}]",
        display.delivery.to_string(),
        display.quantity,
        display.cost,
        display.prices.one,
        display.prices.two,
        display.prices.three,
    );
}

fn cmd_simulate(config_path: &Path, nozzle: u8, ticks: u32, realtime: bool) -> ProjectResult<()> {
    let config = load_config(config_path)?;
    let channel = Channel::from_number(nozzle)?;
    let station = PumpStation::new(config.pump().as_ref(), &config.params()?);
    let ticker = config.pulse_ticker();
    let period = Duration::from_millis(config.ticker.period_ms);

    // Nozzle sensors report from their own thread.
    let queue = EventQueue::new();
    let sensor = queue.sender();
    let lifted =
        thread::spawn(move || sensor.send(PumpEvent::Nozzle(channel, NozzleState::Up))).join();
    match lifted {
        Ok(sent) => sent?,
        Err(_) => return Err(PumpError::QueueDisconnected.into()),
    }

    println!("Simulating {} on channel {}", config.name, channel);
    queue.drain(station.sinks())?;
    print_display(&station.snapshot());

    for _ in 0..ticks {
        if realtime {
            thread::sleep(period);
        }
        station.tick(&ticker);
        print_display(&station.snapshot());
    }

    queue
        .sender()
        .send(PumpEvent::Nozzle(channel, NozzleState::Down))?;
    queue.drain(station.sinks())?;
    print_display(&station.snapshot());

    info!(ticks, "simulation finished");
    station.shutdown();
    Ok(())
}
