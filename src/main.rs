use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use live_eq_lib::audio::devices::DeviceProvider;
use live_eq_lib::commands::{self, CommandOutcome, ControlCommand};
use live_eq_lib::{CpalDeviceProvider, EqualizerConfig, EqualizerPipeline};

/// Live multiband equalizer: capture, equalize, play back
#[derive(Parser, Debug)]
#[command(name = "live-eq", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "equalizer.toml")]
    config: PathBuf,

    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Start equalizing immediately
    #[arg(long)]
    autostart: bool,

    /// Log every capture cycle
    #[arg(long)]
    audio_debug: bool,
}

fn print_devices(provider: &dyn DeviceProvider) -> Result<()> {
    let devices = provider
        .list_devices()
        .context("Failed to enumerate audio devices")?;
    for device in devices {
        println!(
            "{:<6} {:>2} ch  {}{}",
            match (device.is_input, device.is_output) {
                (true, true) => "in/out",
                (true, false) => "in",
                _ => "out",
            },
            device.channels,
            device.name,
            if device.is_default { " (default)" } else { "" }
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    live_eq_lib::log::init_tracing("info");
    let cli = Cli::parse();

    let provider = Arc::new(CpalDeviceProvider::new());
    if cli.list_devices {
        return print_devices(provider.as_ref());
    }
    if cli.audio_debug {
        live_eq_lib::log::set_audio_debug(true);
    }

    let config = EqualizerConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let mut pipeline = EqualizerPipeline::from_config(&config, provider)
        .context("Failed to build equalizer pipeline")?;

    info!(
        "{} {} bands ready, type 'help' for commands",
        "LIVE_EQ".green(),
        pipeline.filter_bank().len()
    );

    if cli.autostart {
        let status = tokio::task::block_in_place(|| commands::start_equalizing(&mut pipeline));
        match status {
            Ok(status) => println!("{}", status),
            Err(e) => error!("{} {}", "LIVE_EQ".red(), e),
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match line.parse::<ControlCommand>() {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                // Start/stop wait on device threads
                match tokio::task::block_in_place(|| commands::execute(&mut pipeline, command)) {
                    CommandOutcome::Continue(status) => println!("{}", status),
                    CommandOutcome::Quit(status) => {
                        println!("{}", status);
                        return Ok(());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("{} Interrupted, shutting down", "LIVE_EQ".yellow());
                break;
            }
        }
    }

    let report = tokio::task::block_in_place(|| pipeline.stop());
    if !report.clean {
        error!(
            "{} Pipeline did not stop cleanly within {:?}",
            "LIVE_EQ".red(),
            pipeline.settings().shutdown_grace
        );
    }
    Ok(())
}
