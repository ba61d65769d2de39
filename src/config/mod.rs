mod defaults;
mod types;

pub use types::Config;

use crate::error::ConfigError;
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load configuration from a YAML file, falling back to defaults when the
    /// file does not exist, then resolve environment overrides once.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
            serde_yaml::from_str(&content)?
        } else {
            debug!("Config file {:?} not found, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Fold environment-style overrides into the value. Overrides are resolved
    /// exactly once at load time; nothing reads the environment afterwards.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PLANRACE_TIMEOUT") {
            self.timeout_sec = value.parse().map_err(|_| ConfigError::InvalidOverride {
                name: "PLANRACE_TIMEOUT",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("PLANRACE_MAX_MEMORY") {
            self.max_memory_kb = value.parse().map_err(|_| ConfigError::InvalidOverride {
                name: "PLANRACE_MAX_MEMORY",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("PLANRACE_HEURISTICS") {
            self.heuristics = split_list(&value);
        }
        if let Some(value) = lookup("PLANRACE_MIXED_HEURISTICS") {
            self.mixed_heuristics = split_list(&value);
        }
        if lookup("PLANRACE_CONTINUE").is_some() {
            self.continue_after_success = true;
        }
        if let Some(value) = lookup("PLANRACE_OPTIMIZE") {
            self.optimize = Some(matches!(value.as_str(), "1" | "true"));
        }
        if lookup("PLANRACE_DEBUG").is_some() {
            self.debug = true;
        }
        if lookup("PLANRACE_NO_LIMIT").is_some() {
            self.no_limit = true;
        }
        if let Some(value) = lookup("PLANRACE_SEARCH_LOG") {
            if !value.trim().is_empty() {
                self.search_log = Some(value.trim().into());
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heuristics.is_empty() || self.mixed_heuristics.is_empty() {
            return Err(ConfigError::NoHeuristics);
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(map: &'a HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + 'a {
        |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeout_sec, 60);
        assert_eq!(config.max_memory_kb, 2_048_000);
        assert_eq!(config.heuristics, vec!["lama"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        let env = HashMap::from([
            ("PLANRACE_TIMEOUT", "120"),
            ("PLANRACE_HEURISTICS", "ff2, cea2"),
            ("PLANRACE_CONTINUE", "yes"),
            ("PLANRACE_OPTIMIZE", "true"),
            ("PLANRACE_SEARCH_LOG", "/tmp/search.log"),
        ]);

        config.apply_overrides(lookup(&env)).unwrap();

        assert_eq!(config.timeout_sec, 120);
        assert_eq!(config.heuristics, vec!["ff2", "cea2"]);
        assert!(config.continue_after_success);
        assert_eq!(config.optimize, Some(true));
        assert_eq!(config.search_log.as_deref().unwrap().to_str(), Some("/tmp/search.log"));
    }

    #[test]
    fn test_optimize_override_off() {
        let mut config = Config::default();
        let env = HashMap::from([("PLANRACE_OPTIMIZE", "0")]);
        config.apply_overrides(lookup(&env)).unwrap();
        assert_eq!(config.optimize, Some(false));
    }

    #[test]
    fn test_invalid_numeric_override() {
        let mut config = Config::default();
        let env = HashMap::from([("PLANRACE_TIMEOUT", "soon")]);
        let err = config.apply_overrides(lookup(&env)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOverride {
                name: "PLANRACE_TIMEOUT",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_heuristics_rejected() {
        let config = Config {
            heuristics: Vec::new(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoHeuristics)));
    }
}
