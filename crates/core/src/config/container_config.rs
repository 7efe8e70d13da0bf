use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigSource, ConfigValidator, TimeoutValidator};

pub const RESOLVE_TIMEOUT_ENV: &str = "MEDIAHUB_RESOLVE_TIMEOUT_MS";
pub const CYCLE_DETECTION_ENV: &str = "MEDIAHUB_CYCLE_DETECTION";

/// Deadline a caller waits for a constructor before giving up
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// How the in-flight tracker decides that a request is circular
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleDetection {
    /// A key is circular only when it is already in flight on the caller's own call chain.
    ///
    /// The chain follows constructor worker threads but not threads a constructor
    /// spawns itself. A resolution made from such a thread starts a new chain, so a
    /// cycle that passes through it is not detected; the caller only sees the
    /// resolve timeout while the cycle keeps recursing. Use [`CycleDetection::Global`]
    /// when constructors resolve from their own threads.
    #[default]
    #[serde(alias = "chain")]
    CallChain,
    /// A key is circular whenever any call chain has it in flight.
    /// Concurrent first resolutions of the same key can be reported as cycles.
    Global,
}

impl CycleDetection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleDetection::CallChain => "call_chain",
            CycleDetection::Global => "global",
        }
    }
}

impl FromStr for CycleDetection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chain" | "call_chain" | "call-chain" => Ok(CycleDetection::CallChain),
            "global" => Ok(CycleDetection::Global),
            _ => Err(ConfigError::invalid_value(
                "cycle_detection",
                s,
                "chain or global",
            )),
        }
    }
}

impl std::fmt::Display for CycleDetection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// On-disk shape of the container section
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContainerConfigFile {
    resolve_timeout_ms: Option<u64>,
    cycle_detection: Option<CycleDetection>,
}

/// Runtime settings of a [`Container`](crate::container::Container)
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub resolve_timeout: Duration,
    pub cycle_detection: CycleDetection,
    sources: HashMap<String, ConfigSource>,
}

impl ContainerConfig {
    pub fn new() -> Self {
        let mut sources = HashMap::new();
        sources.insert(
            "resolve_timeout".to_string(),
            ConfigSource::Default(format!("{}ms", DEFAULT_RESOLVE_TIMEOUT.as_millis())),
        );
        sources.insert(
            "cycle_detection".to_string(),
            ConfigSource::Default(CycleDetection::default().to_string()),
        );

        Self {
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            cycle_detection: CycleDetection::default(),
            sources,
        }
    }

    /// Override the resolution deadline
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self.sources
            .insert("resolve_timeout".to_string(), ConfigSource::Programmatic);
        self
    }

    /// Override the cycle detection mode
    pub fn with_cycle_detection(mut self, mode: CycleDetection) -> Self {
        self.cycle_detection = mode;
        self.sources
            .insert("cycle_detection".to_string(), ConfigSource::Programmatic);
        self
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(timeout_str) = env::var(RESOLVE_TIMEOUT_ENV) {
            let millis: u64 = timeout_str.trim().parse().map_err(|_| {
                ConfigError::invalid_value(
                    "resolve_timeout",
                    timeout_str.clone(),
                    "timeout in whole milliseconds",
                )
            })?;
            config.resolve_timeout = Duration::from_millis(millis);
            config.sources.insert(
                "resolve_timeout".to_string(),
                ConfigSource::EnvVar(RESOLVE_TIMEOUT_ENV.to_string()),
            );
        }

        if let Ok(mode) = env::var(CYCLE_DETECTION_ENV) {
            config.cycle_detection = mode.parse()?;
            config.sources.insert(
                "cycle_detection".to_string(),
                ConfigSource::EnvVar(CYCLE_DETECTION_ENV.to_string()),
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML document; missing fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: ContainerConfigFile = serde_yaml::from_str(yaml)?;
        let mut config = Self::new();

        if let Some(millis) = file.resolve_timeout_ms {
            config.resolve_timeout = Duration::from_millis(millis);
            config.sources.insert(
                "resolve_timeout".to_string(),
                ConfigSource::File("resolve_timeout_ms".to_string()),
            );
        }

        if let Some(mode) = file.cycle_detection {
            config.cycle_detection = mode;
            config.sources.insert(
                "cycle_detection".to_string(),
                ConfigSource::File("cycle_detection".to_string()),
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file on disk
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        TimeoutValidator::default().validate(&self.resolve_timeout)
    }

    /// Where each field's value came from
    pub fn config_sources(&self) -> &HashMap<String, ConfigSource> {
        &self.sources
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        env::remove_var(RESOLVE_TIMEOUT_ENV);
        env::remove_var(CYCLE_DETECTION_ENV);
    }

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.resolve_timeout, Duration::from_secs(5));
        assert_eq!(config.cycle_detection, CycleDetection::CallChain);
        assert!(config.config_sources()["resolve_timeout"].is_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cycle_detection_parsing() {
        assert_eq!("chain".parse::<CycleDetection>().unwrap(), CycleDetection::CallChain);
        assert_eq!("Global".parse::<CycleDetection>().unwrap(), CycleDetection::Global);
        assert!("sometimes".parse::<CycleDetection>().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        env::set_var(RESOLVE_TIMEOUT_ENV, "250");
        env::set_var(CYCLE_DETECTION_ENV, "global");

        let config = ContainerConfig::from_env().unwrap();
        assert_eq!(config.resolve_timeout, Duration::from_millis(250));
        assert_eq!(config.cycle_detection, CycleDetection::Global);
        assert!(config.config_sources()["resolve_timeout"].is_env_var());
        assert!(config.config_sources()["cycle_detection"].is_env_var());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_when_unset() {
        clear_env();

        let config = ContainerConfig::from_env().unwrap();
        assert_eq!(config.resolve_timeout, DEFAULT_RESOLVE_TIMEOUT);
        assert!(config.config_sources()["cycle_detection"].is_default());
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        clear_env();
        env::set_var(RESOLVE_TIMEOUT_ENV, "soon");
        assert!(matches!(
            ContainerConfig::from_env(),
            Err(ConfigError::InvalidValue { .. })
        ));

        env::set_var(RESOLVE_TIMEOUT_ENV, "0");
        assert!(ContainerConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_from_yaml() {
        let config = ContainerConfig::from_yaml_str(
            "resolve_timeout_ms: 1500\ncycle_detection: global\n",
        )
        .unwrap();
        assert_eq!(config.resolve_timeout, Duration::from_millis(1500));
        assert_eq!(config.cycle_detection, CycleDetection::Global);

        let config = ContainerConfig::from_yaml_str("cycle_detection: chain\n").unwrap();
        assert_eq!(config.cycle_detection, CycleDetection::CallChain);
        assert_eq!(config.resolve_timeout, DEFAULT_RESOLVE_TIMEOUT);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_fields() {
        let result = ContainerConfig::from_yaml_str("resolve_timeout: 5\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_config_failures_by_kind() {
        let missing = ContainerConfig::from_yaml_file("/nonexistent/mediahub/container.yaml");
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let zero = ContainerConfig::from_yaml_str("resolve_timeout_ms: 0\n");
        match zero {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "resolve_timeout"),
            other => panic!("expected an invalid value, got {:?}", other),
        }
    }
}
