//! Keyboard Stats - per-key press counter
//!
//! Watches every attached keyboard and keeps a CSV of how often each key was
//! pressed, saving on an interval and once more on Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use keyboard_stats::config::{config_path, Config};

#[derive(Debug, Parser)]
#[command(name = "keyboard-stats", version, about = "Keyboard Statistics Collector")]
struct Cli {
    /// Path to the CSV file for storing key press data
    #[arg(required_unless_present = "list_devices")]
    output: Option<PathBuf>,

    /// Seconds between periodic saves [default: 60]
    #[arg(short, long, value_name = "SECS")]
    interval: Option<u64>,

    /// Comma separated substrings that mark a device name as a keyboard
    /// [default: keyboard,keybrd,keypad]
    #[arg(short = 'k', long, value_name = "NAMES", value_delimiter = ',')]
    keyboard_names: Option<Vec<String>>,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write a JSON session report here on exit
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// List input devices and whether they qualify as keyboards, then exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().with_context(|| match config_path() {
            Ok(path) => format!("Failed to load config {}", path.display()),
            Err(_) => "Failed to load config".to_string(),
        })?,
    };

    if let Some(secs) = cli.interval {
        config.monitor.save_interval_secs = secs;
    }
    if let Some(names) = &cli.keyboard_names {
        config.classifier.name_patterns = names.clone();
    }
    config.validate()?;
    Ok(config)
}

#[cfg(target_os = "linux")]
fn run(cli: Cli) -> Result<ExitCode> {
    use chrono::Local;
    use keyboard_stats::keyboard::{find_keyboards, list_devices, EventSource, MonitorError};
    use keyboard_stats::report::SessionReport;
    use keyboard_stats::{
        store, KeyCounter, Monitor, MonitorExit, Persister, SaveScheduler, ShutdownSignal,
    };
    use log::{error, info};
    use std::sync::Arc;

    let config = load_config(&cli)?;
    let classifier = config.classifier();

    if cli.list_devices {
        for device in list_devices(&classifier)? {
            let verdict = if device.qualifies { "keyboard" } else { "-" };
            match (&device.name, &device.error) {
                (Some(name), _) => println!(
                    "{:<22} {:<9} {:>4} keys  {}",
                    device.path.display(),
                    verdict,
                    device.key_count,
                    name
                ),
                (None, Some(e)) => println!("{:<22} unreadable: {}", device.path.display(), e),
                (None, None) => println!("{:<22} unreadable", device.path.display()),
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let output = cli.output.clone().context("No output file given")?;
    let baseline = store::load(&output)
        .with_context(|| format!("Failed to read existing data from {}", output.display()))?;
    info!(
        "Loaded {} key(s), {} press(es) from {}",
        baseline.len(),
        baseline.values().sum::<u64>(),
        output.display()
    );
    let counter = Arc::new(KeyCounter::from_table(baseline.clone()));

    let keyboards = match find_keyboards(&classifier) {
        Ok(keyboards) => keyboards,
        Err(MonitorError::NoDevices) => {
            println!("No keyboards found");
            return Ok(ExitCode::SUCCESS);
        }
        Err(e @ MonitorError::PermissionDenied(_)) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    println!("Monitoring keyboards:");
    for keyboard in &keyboards {
        println!("- {}", keyboard.name());
    }
    let device_names: Vec<String> = keyboards.iter().map(|k| k.name().to_string()).collect();

    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.trigger())
            .context("Failed to install interrupt handler")?;
    }

    let persister = Arc::new(Persister::new(output.clone(), Arc::clone(&counter)));
    let scheduler = SaveScheduler::spawn(
        Arc::clone(&persister),
        config.save_interval(),
        shutdown.clone(),
    )
    .context("Failed to start periodic save thread")?;

    let started_at = Local::now();
    let sources: Vec<Box<dyn EventSource>> = keyboards
        .into_iter()
        .map(|k| Box::new(k) as Box<dyn EventSource>)
        .collect();
    let mut monitor =
        Monitor::new(sources, Arc::clone(&counter)).with_poll_timeout(config.poll_timeout());
    let outcome = monitor.run(&shutdown);

    // The periodic thread must be gone before the final save so exactly one
    // write reflects the end state.
    scheduler.stop();

    match &outcome {
        Ok(o) if o.exit == MonitorExit::Shutdown => {
            println!("Keyboard Interrupt detected. Saving data...")
        }
        Ok(_) => println!("No keyboards left to monitor. Saving data..."),
        Err(e) => error!("Monitoring stopped: {}", e),
    }

    if let Err(e) = persister.flush() {
        eprintln!("Failed to save {}: {}", output.display(), e);
        return Ok(ExitCode::FAILURE);
    }
    println!("Data saved. Exiting...");

    let report = SessionReport::new(started_at, device_names, &baseline, &counter.snapshot());
    for line in report.summary_lines() {
        println!("{}", line);
    }
    if let Some(path) = &cli.report {
        report
            .export_json(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    outcome?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(not(target_os = "linux"))]
fn run(cli: Cli) -> Result<ExitCode> {
    load_config(&cli)?;
    eprintln!("keyboard-stats reads evdev devices and only runs on Linux");
    Ok(ExitCode::FAILURE)
}
