//! Configuration validation utilities.

use tartan_framework::TimeLocation;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, TartanConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TartanConfig) -> ConfigResult<()> {
    if config.token.trim().is_empty() {
        return Err(ConfigError::missing_field("token"));
    }

    validate_partitioning(config)?;
    TimeLocation::parse(&config.time_location)?;

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output is 'file' but logging.filePath is not set",
        ));
    }

    Ok(())
}

/// Validates partition count and queue size.
fn validate_partitioning(config: &TartanConfig) -> ConfigResult<()> {
    let n = config.message_partition_count;
    if n < 1 || !(n as u64).is_power_of_two() {
        return Err(ConfigError::validation(format!(
            "messagePartitionCount must be a power of two, got {n}"
        )));
    }
    if n > 1 << 15 {
        return Err(ConfigError::validation(format!(
            "messagePartitionCount must be at most 32768, got {n}"
        )));
    }
    if config.message_queue_buffer_size < 1 {
        return Err(ConfigError::validation(format!(
            "messageQueueBufferSize must be at least 1, got {}",
            config.message_queue_buffer_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_with_token_are_valid() {
        assert!(validate_config(&TartanConfig::with_token("xoxb-1")).is_ok());
    }

    #[test]
    fn test_token_is_required() {
        let err = validate_config(&TartanConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "token"));
    }

    #[test]
    fn test_partition_count_must_be_power_of_two() {
        for bad in [0, 3, 6, -4] {
            let config = TartanConfig {
                message_partition_count: bad,
                ..TartanConfig::with_token("t")
            };
            let err = validate_config(&config).unwrap_err();
            assert!(err.to_string().contains(&bad.to_string()), "{err}");
        }
        let config = TartanConfig {
            message_partition_count: 16,
            ..TartanConfig::with_token("t")
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_queue_and_zone() {
        let config = TartanConfig {
            message_queue_buffer_size: 0,
            ..TartanConfig::with_token("t")
        };
        assert!(validate_config(&config).is_err());

        let config = TartanConfig {
            time_location: "Nowhere/Special".into(),
            ..TartanConfig::with_token("t")
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::TimeLocation(_))
        ));
    }
}
