use crate::audio::mixer::pipeline::EqualizerPipeline;
use crate::commands::{ControlCommand, HELP_TEXT};

/// Result of executing one control command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Continue(String),
    Quit(String),
}

// Equalizer control commands. Each returns the status line shown to the user.

pub fn set_band_gain(pipeline: &EqualizerPipeline, band: usize, gain_db: f32) -> Result<String, String> {
    let applied = pipeline
        .control()
        .set_band_gain(band, gain_db)
        .map_err(|e| e.to_string())?;
    let center = pipeline
        .filter_bank()
        .get(band)
        .map(|filter| filter.band().center_hz())
        .unwrap_or_default();
    Ok(format!("Updated {} Hz Gain to {:.1} dB", center, applied))
}

pub fn set_master_volume(pipeline: &EqualizerPipeline, percent: f32) -> Result<String, String> {
    let applied = pipeline
        .control()
        .set_master_volume(percent / 100.0)
        .map_err(|e| e.to_string())?;
    Ok(format!("Updated volume to {:.0} %", applied * 100.0))
}

pub fn reset_band_gains(pipeline: &EqualizerPipeline) -> String {
    pipeline.control().reset_gains();
    "Reset band gains".to_string()
}

pub fn start_equalizing(pipeline: &mut EqualizerPipeline) -> Result<String, String> {
    pipeline.start().map_err(|e| e.to_string())?;
    Ok("Equalizer enabled".to_string())
}

pub fn stop_equalizing(pipeline: &mut EqualizerPipeline) -> String {
    let report = pipeline.stop();
    if report.clean {
        "Equalizer disabled".to_string()
    } else {
        format!(
            "Equalizer disabled (a loop did not stop within {:?})",
            pipeline.settings().shutdown_grace
        )
    }
}

pub fn toggle_equalizer(pipeline: &mut EqualizerPipeline) -> Result<String, String> {
    if pipeline.is_running() {
        Ok(stop_equalizing(pipeline))
    } else {
        start_equalizing(pipeline)
    }
}

pub fn describe_bands(pipeline: &EqualizerPipeline) -> String {
    let gains = pipeline.control().gains();
    pipeline
        .filter_bank()
        .filters()
        .iter()
        .zip(gains)
        .map(|(filter, gain)| {
            let band = filter.band();
            format!(
                "{:>2}: {:>8} [{} - {} Hz] {:+.1} dB",
                filter.index(),
                band.label(),
                band.low_hz,
                band.high_hz,
                gain
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn pipeline_status(pipeline: &EqualizerPipeline) -> Result<String, String> {
    let status = serde_json::json!({
        "phase": pipeline.phase(),
        "controls": pipeline.control().snapshot(),
        "queue": pipeline.queue_info(),
        "stats": pipeline.get_stats(),
    });
    serde_json::to_string_pretty(&status).map_err(|e| e.to_string())
}

pub fn list_devices(pipeline: &EqualizerPipeline) -> Result<String, String> {
    let devices = pipeline.list_devices().map_err(|e| e.to_string())?;
    if devices.is_empty() {
        return Ok("No audio devices found".to_string());
    }
    Ok(devices
        .iter()
        .map(|device| {
            let direction = match (device.is_input, device.is_output) {
                (true, true) => "in/out",
                (true, false) => "in",
                _ => "out",
            };
            format!(
                "{:<6} {}{}",
                direction,
                device.name,
                if device.is_default { " (default)" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Run one command against the pipeline. Failures are reported as status
/// text; only `quit` ends the session.
pub fn execute(pipeline: &mut EqualizerPipeline, command: ControlCommand) -> CommandOutcome {
    let result = match command {
        ControlCommand::SetGain { band, gain_db } => set_band_gain(pipeline, band, gain_db),
        ControlCommand::SetVolume { percent } => set_master_volume(pipeline, percent),
        ControlCommand::ResetGains => Ok(reset_band_gains(pipeline)),
        ControlCommand::Start => start_equalizing(pipeline),
        ControlCommand::Stop => Ok(stop_equalizing(pipeline)),
        ControlCommand::Toggle => toggle_equalizer(pipeline),
        ControlCommand::Bands => Ok(describe_bands(pipeline)),
        ControlCommand::Status => pipeline_status(pipeline),
        ControlCommand::Devices => list_devices(pipeline),
        ControlCommand::AudioDebug(enabled) => {
            crate::log::set_audio_debug(enabled);
            Ok(format!(
                "Audio debug logging {}",
                if enabled { "enabled" } else { "disabled" }
            ))
        }
        ControlCommand::Help => Ok(HELP_TEXT.to_string()),
        ControlCommand::Quit => {
            stop_equalizing(pipeline);
            return CommandOutcome::Quit("Bye".to_string());
        }
    };

    match result {
        Ok(status) => CommandOutcome::Continue(status),
        Err(e) => CommandOutcome::Continue(format!("Error: {}", e)),
    }
}
