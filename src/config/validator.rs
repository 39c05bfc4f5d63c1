use crate::config::VenvConfig;
use crate::error::{Error, Result};

/// Validates the connection settings
pub fn validate_connection(config: &VenvConfig) -> Result<()> {
    if config.host.trim().is_empty() {
        return Err(Error::ConfigInvalid("host is empty".to_string()));
    }
    if config.database.trim().is_empty() {
        return Err(Error::ConfigInvalid("database is empty".to_string()));
    }
    if config.port == Some(0) {
        return Err(Error::ConfigInvalid(
            "port 0 is not allowed; omit the port to allocate a free one".to_string(),
        ));
    }
    Ok(())
}

/// Validates boot and stop timing
pub fn validate_timing(config: &VenvConfig) -> Result<()> {
    if config.boot_timeout_secs == 0 {
        return Err(Error::ConfigInvalid("bootTimeoutSecs must be positive".to_string()));
    }
    if config.poll_interval_millis == 0 {
        return Err(Error::ConfigInvalid(
            "pollIntervalMillis must be positive".to_string(),
        ));
    }
    if config.stop_timeout_secs == 0 {
        return Err(Error::ConfigInvalid("stopTimeoutSecs must be positive".to_string()));
    }

    let settings = config.boot_settings();
    if settings.poll_interval > settings.timeout {
        return Err(Error::ConfigInvalid(format!(
            "poll interval {:?} exceeds boot timeout {:?}",
            settings.poll_interval, settings.timeout
        )));
    }
    Ok(())
}

/// Validates the name of the variable that receives the connection URI
pub fn validate_env_var(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::ConfigInvalid("envVar is empty".to_string()));
    }
    if name.contains('=') || name.contains('\0') {
        return Err(Error::ConfigInvalid(format!(
            "envVar '{}' is not a valid variable name",
            name
        )));
    }
    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &VenvConfig) -> Result<()> {
    validate_connection(config)?;
    validate_timing(config)?;
    validate_env_var(&config.env_var)?;

    if let Some(bin_dir) = &config.bin_dir {
        if !bin_dir.is_dir() {
            return Err(Error::ConfigInvalid(format!(
                "binDir '{}' is not a directory",
                bin_dir.display()
            )));
        }
    }

    Ok(())
}
