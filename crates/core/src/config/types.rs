use serde::{Deserialize, Serialize};

use crate::converter::ConversionSettings;
use crate::engine::EngineConfig;
use crate::naming::NamingConfig;
use crate::queue::QueueConfig;

/// Root configuration
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub conversion: ConversionSettings,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{Mp3Mode, OutputFormat};

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.conversion, ConversionSettings::default());
        assert!(config.naming.same_folder_as_input);
        assert_eq!(config.engine.gst_launch_path.to_str(), Some("gst-launch-1.0"));
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[conversion]
delete_original = true
resample = true
resample_rate = 44100

[conversion.output]
format = "mp3"
mode = "cbr"
quality = 320

[naming]
same_folder_as_input = false
selected_folder = "/music"
create_subfolders = true
subfolder_pattern = "%(album-artist)s/%(album)s"
basename_pattern = "%(track-number)02d-%(title)s"
replace_messy_chars = true

[queue]
max_concurrency = 3

[engine]
gst_launch_path = "/usr/local/bin/gst-launch-1.0"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.conversion.delete_original);
        assert_eq!(
            config.conversion.output,
            OutputFormat::Mp3 {
                mode: Mp3Mode::Cbr,
                quality: 320
            }
        );
        assert_eq!(config.naming.selected_folder.as_deref(), Some("/music"));
        assert!(config.naming.replace_messy_chars);
        assert_eq!(config.queue.max_concurrency, 3);
        assert_eq!(config.queue.progress_interval_ms, 100);
        assert_eq!(
            config.engine.gst_launch_path.to_str(),
            Some("/usr/local/bin/gst-launch-1.0")
        );
        assert_eq!(config.engine.gst_inspect_path.to_str(), Some("gst-inspect-1.0"));
    }

    #[test]
    fn test_unknown_format_fails() {
        let toml = r#"
[conversion.output]
format = "wma"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
