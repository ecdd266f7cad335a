//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use checkout::CheckoutConfig;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5050;

/// Value of `KAFKA_ADDR` that selects the in-process broker.
pub const IN_MEMORY_BUS: &str = "memory";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Where order events go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BusTarget {
    /// No bus: the publish stage is skipped.
    #[default]
    Disabled,
    InMemory,
    /// Kafka bootstrap servers.
    Kafka(String),
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `CHECKOUT_PORT`: listen port (default: `5050`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `KAFKA_ADDR`: unset disables events, `memory` selects the in-process
///   broker, anything else is a Kafka bootstrap list
/// - `FLAGD_FILE`: flagd definition file; unset leaves every flag at its default
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP/gRPC collector for spans; unset keeps
///   spans in process, where they still drive trace propagation
/// - `REQUEST_TIMEOUT_MS` (default: `10000`)
/// - `BEST_EFFORT_TIMEOUT_MS` (default: `2000`)
/// - `PUBLISH_TIMEOUT_MS` (default: `5000`)
/// - `PRODUCER_QUEUE_CAPACITY` (default: `256`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub bus: BusTarget,
    pub flagd_file: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub request_timeout: Duration,
    pub best_effort_timeout: Duration,
    pub publish_timeout: Duration,
    pub producer_queue_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bus = match get("KAFKA_ADDR") {
            None => BusTarget::Disabled,
            Some(addr) if addr.eq_ignore_ascii_case(IN_MEMORY_BUS) => BusTarget::InMemory,
            Some(addr) => BusTarget::Kafka(addr),
        };

        let producer_queue_capacity =
            parse(&get, "PRODUCER_QUEUE_CAPACITY", defaults.producer_queue_capacity)?;
        if producer_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "PRODUCER_QUEUE_CAPACITY",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "CHECKOUT_PORT", defaults.port)?,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&get, "LOG_FORMAT", defaults.log_format)?,
            bus,
            flagd_file: get("FLAGD_FILE"),
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
            request_timeout: millis(&get, "REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            best_effort_timeout: millis(
                &get,
                "BEST_EFFORT_TIMEOUT_MS",
                defaults.best_effort_timeout,
            )?,
            publish_timeout: millis(&get, "PUBLISH_TIMEOUT_MS", defaults.publish_timeout)?,
            producer_queue_capacity,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Orchestrator settings derived from this configuration.
    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            best_effort_timeout: self.best_effort_timeout,
            publish_timeout: self.publish_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let checkout = CheckoutConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            bus: BusTarget::Disabled,
            flagd_file: None,
            otlp_endpoint: None,
            request_timeout: Duration::from_secs(10),
            best_effort_timeout: checkout.best_effort_timeout,
            publish_timeout: checkout.publish_timeout,
            producer_queue_capacity: 256,
        }
    }
}

fn parse<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn millis<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let ms = parse(get, var, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serial_test::serial;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 5050);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.bus, BusTarget::Disabled);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.best_effort_timeout, Duration::from_secs(2));
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
        assert_eq!(config.producer_queue_capacity, 256);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_bus_target_selection() {
        let memory = from_pairs(&[("KAFKA_ADDR", "memory")]).unwrap();
        assert_eq!(memory.bus, BusTarget::InMemory);

        let kafka = from_pairs(&[("KAFKA_ADDR", "kafka:9092")]).unwrap();
        assert_eq!(kafka.bus, BusTarget::Kafka("kafka:9092".to_string()));

        let blank = from_pairs(&[("KAFKA_ADDR", "  ")]).unwrap();
        assert_eq!(blank.bus, BusTarget::Disabled);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("CHECKOUT_PORT", "7070"),
            ("LOG_FORMAT", "JSON"),
            ("FLAGD_FILE", "/etc/flagd/demo.flagd.json"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://otel-collector:4317"),
            ("REQUEST_TIMEOUT_MS", "1500"),
            ("BEST_EFFORT_TIMEOUT_MS", "250"),
            ("PUBLISH_TIMEOUT_MS", "750"),
            ("PRODUCER_QUEUE_CAPACITY", "8"),
        ])
        .unwrap();

        assert_eq!(config.port, 7070);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.flagd_file.as_deref(), Some("/etc/flagd/demo.flagd.json"));
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://otel-collector:4317"));
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.producer_queue_capacity, 8);

        let checkout = config.checkout_config();
        assert_eq!(checkout.best_effort_timeout, Duration::from_millis(250));
        assert_eq!(checkout.publish_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_eq!(
            from_pairs(&[("CHECKOUT_PORT", "http")]),
            Err(ConfigError::Invalid {
                var: "CHECKOUT_PORT",
                value: "http".to_string()
            })
        );
        assert!(from_pairs(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(from_pairs(&[("REQUEST_TIMEOUT_MS", "-1")]).is_err());
        assert!(from_pairs(&[("PRODUCER_QUEUE_CAPACITY", "0")]).is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe {
            std::env::set_var("CHECKOUT_PORT", "6060");
            std::env::set_var("KAFKA_ADDR", "memory");
        }

        let config = Config::from_env();

        // SAFETY: as above.
        unsafe {
            std::env::remove_var("CHECKOUT_PORT");
            std::env::remove_var("KAFKA_ADDR");
        }

        let config = config.unwrap();
        assert_eq!(config.port, 6060);
        assert_eq!(config.bus, BusTarget::InMemory);
    }
}
