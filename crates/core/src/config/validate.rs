use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Credentials are present
/// - Port is not 0
/// - At least one download worker
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "ASVO_HOST env variable not defined".to_string(),
        ));
    }

    if config.port == 0 {
        return Err(ConfigError::ValidationError("port cannot be 0".to_string()));
    }

    if config.user.is_empty() {
        return Err(ConfigError::ValidationError(
            "ASVO_USER env variable not defined".to_string(),
        ));
    }

    if config.pass.is_empty() {
        return Err(ConfigError::ValidationError(
            "ASVO_PASS env variable not defined".to_string(),
        ));
    }

    if config.download_workers == 0 {
        return Err(ConfigError::ValidationError(
            "download_workers must be at least 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            user: "alice".to_string(),
            pass: "secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_missing_user() {
        let config = Config {
            user: String::new(),
            ..valid()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("ASVO_USER")));
    }

    #[test]
    fn test_validate_missing_pass() {
        let config = Config {
            pass: String::new(),
            ..valid()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("ASVO_PASS")));
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config { port: 0, ..valid() };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let config = Config {
            download_workers: 0,
            ..valid()
        };
        assert!(validate_config(&config).is_err());
    }
}
