use std::io::Write;

use live_eq_lib::audio::types::FrequencyBand;
use live_eq_lib::config::{ConfigError, EqualizerConfig};
use tempfile::NamedTempFile;

/// Configuration loading and validation
#[cfg(test)]
mod config_tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
[equalizer]
input_device_name = "CABLE Output"
output_device_name = "Realtek"
sample_rate = 44100
block_size = 512
initial_volume = 0.75
max_queue_size = 16
num_dsp_workers = 6
blocks_per_cycle = 2
filter_order = 3
shutdown_grace_ms = 250
capture_idle_ms = 5
playback_idle_us = 50
bands = [[60, 250], [250, 2000], [2000, 8000]]
"#;

    fn write_config(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_full_config_from_file() {
        let file = write_config(FULL_CONFIG);
        let config = EqualizerConfig::load(file.path()).unwrap();

        assert_eq!(config.input_device_name, "CABLE Output");
        assert_eq!(config.output_device_name, "Realtek");
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.initial_volume, 0.75);
        assert_eq!(config.max_queue_size, 16);
        assert_eq!(config.num_dsp_workers, 6);
        assert_eq!(config.frames_per_cycle(), 1024);
        assert_eq!(config.filter_order, 3);
        assert_eq!(config.shutdown_grace_ms, 250);
        assert_eq!(
            config.frequency_bands(),
            &[
                FrequencyBand::new(60.0, 250.0),
                FrequencyBand::new(250.0, 2000.0),
                FrequencyBand::new(2000.0, 8000.0),
            ]
        );
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = EqualizerConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_missing_section_and_keys() {
        let result = EqualizerConfig::from_toml_str("[something_else]\nvalue = 1\n");
        assert!(matches!(result, Err(ConfigError::MissingSection("equalizer"))));

        for key in [
            "input_device_name",
            "output_device_name",
            "sample_rate",
            "block_size",
            "initial_volume",
            "max_queue_size",
            "num_dsp_workers",
        ] {
            let text: String = FULL_CONFIG
                .lines()
                .filter(|line| !line.starts_with(&format!("{} =", key)))
                .collect::<Vec<_>>()
                .join("\n");
            match EqualizerConfig::from_toml_str(&text) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, key),
                other => panic!("expected Missing({}), got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_malformed_values_fail_to_parse() {
        let text = FULL_CONFIG.replace("sample_rate = 44100", "sample_rate = \"fast\"");
        assert!(matches!(
            EqualizerConfig::from_toml_str(&text),
            Err(ConfigError::Parse(_))
        ));

        let text = FULL_CONFIG.replace("block_size = 512", "block_size = -512");
        assert!(matches!(
            EqualizerConfig::from_toml_str(&text),
            Err(ConfigError::Parse(_))
        ));

        assert!(matches!(
            EqualizerConfig::from_toml_str("[equalizer\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_are_invalid() {
        let cases = [
            ("sample_rate = 44100", "sample_rate = 4000", "sample_rate"),
            ("block_size = 512", "block_size = 8", "block_size"),
            ("initial_volume = 0.75", "initial_volume = 2.5", "initial_volume"),
            ("num_dsp_workers = 6", "num_dsp_workers = 0", "num_dsp_workers"),
            ("blocks_per_cycle = 2", "blocks_per_cycle = 0", "blocks_per_cycle"),
            ("filter_order = 3", "filter_order = 0", "filter_order"),
            ("bands = [[60, 250], [250, 2000], [2000, 8000]]", "bands = [[250, 60]]", "bands"),
            ("bands = [[60, 250], [250, 2000], [2000, 8000]]", "bands = [[60, 30000]]", "bands"),
            ("bands = [[60, 250], [250, 2000], [2000, 8000]]", "bands = []", "bands"),
        ];

        for (from, to, expected_key) in cases {
            let text = FULL_CONFIG.replace(from, to);
            match EqualizerConfig::from_toml_str(&text) {
                Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("expected Invalid({}), got {:?}", expected_key, other),
            }
        }
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let text = FULL_CONFIG.replace("filter_order = 3", "filter_order = 3\nfliter_order = 4");
        assert!(matches!(
            EqualizerConfig::from_toml_str(&text),
            Err(ConfigError::Parse(_))
        ));
    }
}
