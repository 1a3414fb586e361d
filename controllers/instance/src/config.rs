//! Controller configuration loaded from environment variables.

use crate::drift::DriftPolicy;
use crate::error::ControllerError;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CONCURRENCY: u16 = 3;
const DEFAULT_DEBOUNCE_MILLIS: u64 = 0;
const DEFAULT_PASS_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;
const DEFAULT_METRICS_PORT: u16 = 8080;

/// Runtime settings of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Maximum number of passes running at once (distinct instances)
    pub concurrency: u16,
    /// Delay before a triggered pass starts, coalescing bursts of events
    pub debounce: Duration,
    /// Deadline for a single pass
    pub pass_timeout: Duration,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub drift_policy: DriftPolicy,
    pub metrics_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            concurrency: DEFAULT_CONCURRENCY,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MILLIS),
            pass_timeout: Duration::from_secs(DEFAULT_PASS_TIMEOUT_SECS),
            backoff_min: Duration::from_secs(DEFAULT_BACKOFF_MIN_SECS),
            backoff_max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
            drift_policy: DriftPolicy::default(),
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            namespace: get("WATCH_NAMESPACE"),
            concurrency: parse_or(get("RECONCILE_CONCURRENCY"), "RECONCILE_CONCURRENCY", DEFAULT_CONCURRENCY)?,
            debounce: Duration::from_millis(parse_or(
                get("DEBOUNCE_MILLIS"),
                "DEBOUNCE_MILLIS",
                DEFAULT_DEBOUNCE_MILLIS,
            )?),
            pass_timeout: Duration::from_secs(parse_or(
                get("PASS_TIMEOUT_SECS"),
                "PASS_TIMEOUT_SECS",
                DEFAULT_PASS_TIMEOUT_SECS,
            )?),
            backoff_min: Duration::from_secs(parse_or(
                get("BACKOFF_MIN_SECS"),
                "BACKOFF_MIN_SECS",
                DEFAULT_BACKOFF_MIN_SECS,
            )?),
            backoff_max: Duration::from_secs(parse_or(
                get("BACKOFF_MAX_SECS"),
                "BACKOFF_MAX_SECS",
                DEFAULT_BACKOFF_MAX_SECS,
            )?),
            drift_policy: parse_or(get("DRIFT_POLICY"), "DRIFT_POLICY", DriftPolicy::default())?,
            metrics_port: parse_or(get("METRICS_PORT"), "METRICS_PORT", DEFAULT_METRICS_PORT)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ControllerError> {
        if self.concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.pass_timeout.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "PASS_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if self.backoff_min.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "BACKOFF_MIN_SECS must be at least 1".to_string(),
            ));
        }
        if self.backoff_max < self.backoff_min {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MAX_SECS ({}) is smaller than BACKOFF_MIN_SECS ({})",
                self.backoff_max.as_secs(),
                self.backoff_min.as_secs()
            )));
        }
        Ok(())
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| {
            ControllerError::InvalidConfig(format!("{} has invalid value '{}': {}", name, raw, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.namespace, None);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.pass_timeout, Duration::from_secs(30));
        assert_eq!(config.drift_policy, DriftPolicy::Ignore);
        assert_eq!(config.metrics_port, 8080);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WATCH_NAMESPACE", "demo"),
            ("RECONCILE_CONCURRENCY", "8"),
            ("DEBOUNCE_MILLIS", "250"),
            ("PASS_TIMEOUT_SECS", "10"),
            ("BACKOFF_MIN_SECS", "1"),
            ("BACKOFF_MAX_SECS", "60"),
            ("DRIFT_POLICY", "report"),
            ("METRICS_PORT", "9090"),
        ])
        .unwrap();

        assert_eq!(config.namespace.as_deref(), Some("demo"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.pass_timeout, Duration::from_secs(10));
        assert_eq!(config.backoff_min, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(60));
        assert_eq!(config.drift_policy, DriftPolicy::Report);
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_blank_namespace_means_all() {
        let config = load(&[("WATCH_NAMESPACE", "  ")]).unwrap();
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_unparseable_value_is_invalid_config() {
        let err = load(&[("RECONCILE_CONCURRENCY", "many")]).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(ref msg) if msg.contains("RECONCILE_CONCURRENCY")));

        let err = load(&[("DRIFT_POLICY", "fix")]).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(load(&[("RECONCILE_CONCURRENCY", "0")]).is_err());
        assert!(load(&[("PASS_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("BACKOFF_MIN_SECS", "0")]).is_err());
        assert!(load(&[("BACKOFF_MIN_SECS", "30"), ("BACKOFF_MAX_SECS", "10")]).is_err());
    }
}
