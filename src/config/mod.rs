pub mod parse;
pub mod record;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_config, ConfigError};
pub use record::CampaignRecord;
pub use types::{CampaignSettings, Config, Credentials, PlatformSettings, RetrySettings};

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax; unset variables are left unchanged.
/// Used so platform credentials can live in the environment instead of the
/// config file.
pub fn expand_env_vars(text: &str) -> String {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();

    re.replace_all(text, |caps: &regex::Captures| {
        let var_name = caps.get(1).unwrap().as_str();
        std::env::var(var_name)
            .unwrap_or_else(|_| caps.get(0).unwrap().as_str().to_string())
    })
    .to_string()
}

/// Expands a leading tilde to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str.starts_with("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(&path_str[2..]);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path from an explicit argument or default
/// locations, checked in order:
/// 1. Explicit path (with tilde expansion)
/// 2. ~/.config/geoprobe/config.yml
/// 3. /etc/geoprobe/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/geoprobe/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/geoprobe/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_expand_env_vars_set_and_unset() {
        std::env::set_var("GEOPROBE_TEST_KEY", "secret");
        let result = expand_env_vars("key: $env{GEOPROBE_TEST_KEY}/$env{GEOPROBE_UNSET}");
        assert_eq!(result, "key: secret/$env{GEOPROBE_UNSET}");
        std::env::remove_var("GEOPROBE_TEST_KEY");
    }

    #[test]
    fn test_expand_env_vars_no_expansion() {
        let result = expand_env_vars("plain text without variables");
        assert_eq!(result, "plain text without variables");
    }

    #[test]
    fn test_expand_tilde_with_path() {
        let expanded = expand_tilde(Path::new("~/measurements"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("measurements"));
        }
    }

    #[test]
    fn test_expand_tilde_absolute_unchanged() {
        let expanded = expand_tilde(Path::new("/var/lib/geoprobe"));
        assert_eq!(expanded, Path::new("/var/lib/geoprobe"));
    }
}
