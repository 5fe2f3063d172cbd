use super::{types::Config, ConfigError};
use crate::uri;

/// Validate configuration
/// Currently validates:
/// - Output format quality knobs are in range
/// - Resample rate is sane when resampling
/// - A selected folder is given when not writing next to the input
/// - Naming patterns are non-empty and not URIs
/// - Concurrency and engine progress frequency are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Conversion validation
    config
        .conversion
        .output
        .check()
        .map_err(|e| ConfigError::ValidationError(format!("conversion.output: {}", e)))?;

    if config.conversion.resample && !(8000..=192000).contains(&config.conversion.resample_rate) {
        return Err(ConfigError::ValidationError(format!(
            "conversion.resample_rate must be 8000-192000, got {}",
            config.conversion.resample_rate
        )));
    }

    // Naming validation
    let naming = &config.naming;
    if !naming.same_folder_as_input
        && naming
            .selected_folder
            .as_deref()
            .map_or(true, |f| f.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "naming.selected_folder is required when naming.same_folder_as_input is false"
                .to_string(),
        ));
    }

    for (key, pattern) in [
        ("naming.basename_pattern", &naming.basename_pattern),
        ("naming.subfolder_pattern", &naming.subfolder_pattern),
    ] {
        if pattern.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!("{} cannot be empty", key)));
        }
        if uri::is_uri(pattern) {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be a URI",
                key
            )));
        }
    }

    // Queue and engine validation
    if config.queue.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_concurrency cannot be 0".to_string(),
        ));
    }
    if config.engine.progress_update_freq == 0 {
        return Err(ConfigError::ValidationError(
            "engine.progress_update_freq cannot be 0".to_string(),
        ));
    }

    Ok(())
}
