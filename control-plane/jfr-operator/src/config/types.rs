use std::time::Duration;

use envconfig::Envconfig;
use jfr_client::BackendConfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    /// Restrict watches to one namespace; all namespaces when unset.
    /// Env: JFR_OPERATOR_WATCH_NAMESPACE
    #[envconfig(from = "JFR_OPERATOR_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Delay between polls of a recording that has not stopped yet.
    /// Env: JFR_OPERATOR_POLL_SECS
    #[envconfig(from = "JFR_OPERATOR_POLL_SECS", default = "10")]
    pub poll_secs: u64,

    /// Requeue delay after a failed reconcile.
    /// Env: JFR_OPERATOR_RETRY_SECS
    #[envconfig(from = "JFR_OPERATOR_RETRY_SECS", default = "30")]
    pub retry_secs: u64,

    #[envconfig(nested)]
    pub features: FeaturesConfig,

    #[envconfig(nested)]
    pub backend: BackendConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct FeaturesConfig {
    /// Keep FlightRecorder.status.events filled from the backend.
    /// Env: JFR_OPERATOR_FEATURES_EVENT_TYPES
    #[envconfig(from = "JFR_OPERATOR_FEATURES_EVENT_TYPES", default = "true")]
    pub event_types: bool,

    /// Publish Kubernetes Events for backend commands.
    /// Env: JFR_OPERATOR_FEATURES_EVENTS
    #[envconfig(from = "JFR_OPERATOR_FEATURES_EVENTS", default = "true")]
    pub events: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            event_types: true,
            events: true,
        }
    }
}

impl OperatorConfig {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            watch_namespace: None,
            poll_secs: 10,
            retry_secs: 30,
            features: FeaturesConfig::default(),
            backend,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_defaults() {
        let env: HashMap<String, String> = [(
            "JFR_BACKEND_URL".to_string(),
            "https://jfr-backend.jfr.svc:8181".to_string(),
        )]
        .into_iter()
        .collect();
        let cfg = OperatorConfig::init_from_hashmap(&env).unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(10));
        assert_eq!(cfg.retry_interval(), Duration::from_secs(30));
        assert!(cfg.watch_namespace.is_none());
        assert!(cfg.features.event_types);
        assert!(cfg.features.events);
        assert_eq!(cfg.backend.timeout_secs, 10);
        assert!(!cfg.backend.insecure_tls);
        assert!(cfg.backend.token.is_none());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<String, String> = [
            ("JFR_BACKEND_URL", "http://b:8181"),
            ("JFR_BACKEND_TOKEN", "abc"),
            ("JFR_OPERATOR_POLL_SECS", "3"),
            ("JFR_OPERATOR_WATCH_NAMESPACE", "apps"),
            ("JFR_OPERATOR_FEATURES_EVENT_TYPES", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let cfg = OperatorConfig::init_from_hashmap(&env).unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(3));
        assert_eq!(cfg.watch_namespace.as_deref(), Some("apps"));
        assert!(!cfg.features.event_types);
        assert_eq!(cfg.backend.token.as_deref(), Some("abc"));
    }

    #[test]
    fn backend_url_is_required() {
        let env: HashMap<String, String> = HashMap::new();
        assert!(OperatorConfig::init_from_hashmap(&env).is_err());
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let mut cfg = OperatorConfig::new(BackendConfig::new("http://b"));
        cfg.poll_secs = 0;
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    }
}
