use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from an optional file with environment variable overrides
///
/// Precedence, lowest first: defaults, TOML file, `ASVO_*` variables, `SSL_VERIFY`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    let config: Config = figment
        .merge(Env::prefixed("ASVO_").ignore(&["CONFIG"]))
        .merge(Env::raw().only(&["SSL_VERIFY"]))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
host = "localhost"
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let result = load_config_from_str("port = \"not a number\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
host = "127.0.0.1"
download_workers = 8
"#
        )
        .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let config = load_config(Some(temp_file.path())).unwrap();
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.download_workers, 8);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("asvo.toml", "host = \"from-file\"\nuser = \"file-user\"")?;
            jail.set_env("ASVO_HOST", "from-env");
            jail.set_env("ASVO_PASS", "hunter2");
            jail.set_env("SSL_VERIFY", "0");

            let config = load_config(Some(Path::new("asvo.toml"))).unwrap();
            assert_eq!(config.host, "from-env");
            assert_eq!(config.user, "file-user");
            assert_eq!(config.pass, "hunter2");
            assert!(!config.ssl_verify);
            Ok(())
        });
    }
}
