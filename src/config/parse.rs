use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string)?;

    // Expand environment variables before parsing so credentials can be
    // injected via the environment.
    let yaml_string = expand_env_vars(&yaml_string);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        ))
    })?;

    config.record.dir = expand_tilde(&config.record.dir);

    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut unexpanded: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .collect();

    if unexpanded.is_empty() {
        return Ok(());
    }

    unexpanded.sort();
    unexpanded.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         \n\
         Either export them (e.g. export {}=...) or replace the references\n\
         in the config file with literal values.",
        unexpanded.join(", "),
        unexpanded[0]
    )))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.platform.base_url.is_empty() {
        errors.push("platform.base_url cannot be empty".to_string());
    }
    if config.platform.credentials.username.is_empty() {
        errors.push("platform.credentials.username cannot be empty".to_string());
    }
    if config.platform.retry.max_attempts == 0 {
        errors.push("platform.retry.max_attempts must be at least 1".to_string());
    }
    if config.campaign.max_concurrent == 0 {
        errors.push("campaign.max_concurrent must be at least 1".to_string());
    }
    if config.campaign.nb_packets == 0 {
        errors.push("campaign.nb_packets must be at least 1".to_string());
    }
    if config.campaign.targets_per_prefix == 0 {
        errors.push("campaign.targets_per_prefix must be at least 1".to_string());
    }
    if config.campaign.address_family != 4 && config.campaign.address_family != 6 {
        errors.push(format!(
            "campaign.address_family must be 4 or 6, got {}",
            config.campaign.address_family
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let file = write_config(
            r#"
platform:
  credentials:
    username: someone@example.org
    key: 0123-secret
campaign: {}
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.platform.base_url, "https://atlas.ripe.net/api/v2");
        assert_eq!(config.platform.request_timeout, Duration::from_secs(20));
        assert_eq!(config.platform.retry.max_attempts, 60);
        assert_eq!(config.platform.retry.interval, Duration::from_secs(2));
        assert_eq!(config.campaign.max_concurrent, 90);
        assert_eq!(config.campaign.nb_packets, 3);
        assert_eq!(config.campaign.targets_per_prefix, 3);
        assert_eq!(config.campaign.address_family, 4);
    }

    #[test]
    fn test_load_config_expands_env_credentials() {
        std::env::set_var("GEOPROBE_PARSE_TEST_KEY", "from-env");
        let file = write_config(
            r#"
platform:
  credentials:
    username: someone@example.org
    key: $env{GEOPROBE_PARSE_TEST_KEY}
campaign: {}
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.platform.credentials.key, "from-env");
        std::env::remove_var("GEOPROBE_PARSE_TEST_KEY");
    }

    #[test]
    fn test_load_config_rejects_unset_env_var() {
        let file = write_config(
            r#"
platform:
  credentials:
    username: someone@example.org
    key: $env{GEOPROBE_DEFINITELY_UNSET_VAR}
campaign: {}
"#,
        );

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("GEOPROBE_DEFINITELY_UNSET_VAR"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let file = write_config(
            r#"
platform:
  credentials:
    username: ""
    key: k
  retry:
    max_attempts: 0
campaign:
  max_concurrent: 0
  address_family: 5
"#,
        );

        let err = load_config(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("username"));
        assert!(message.contains("max_attempts"));
        assert!(message.contains("max_concurrent"));
        assert!(message.contains("address_family"));
    }
}
