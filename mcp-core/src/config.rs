use std::time::Duration;

use garde::Validate;

/// Typed, validated application configuration loaded once at startup from
/// environment variables.
///
/// Construction validates secret strength and other fatal conditions; a
/// failure here means the process must exit before accepting traffic.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub environment: Environment,
    pub allowed_origins: Vec<String>,

    pub auth_signing_key: Vec<u8>,
    pub auth_token_ttl: Duration,

    pub rate_limit_per_minute: u64,
    pub rate_limit_per_hour: u64,
    pub rate_limit_per_day: u64,
    pub rate_limit_burst: u64,

    pub graph_uri: String,
    pub graph_user: String,
    pub graph_password: String,
    pub graph_database: String,

    pub pool_max: usize,
    pub pool_acquire_timeout: Duration,
    pub conn_lifetime: Duration,

    pub exec_workers: usize,
    pub exec_timeout_max: Duration,
    pub exec_mem_bytes: u64,
    pub exec_output_bytes: usize,

    pub cache_capacity: usize,
    pub cache_ttl: Duration,

    pub breaker_read_failures: u32,
    pub breaker_read_successes: u32,
    pub breaker_read_timeout: Duration,
    pub breaker_write_failures: u32,
    pub breaker_write_successes: u32,
    pub breaker_write_timeout: Duration,

    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// A configuration problem severe enough to abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("weak AUTH_SIGNING_KEY rejected outside development: {0}")]
    WeakSigningKey(String),
}

/// The subset of [`AppConfig`] that `garde` can check directly (ranges and
/// lengths); the rest of the struct's fields (durations, byte keys, enums)
/// are validated by hand above and below.
#[derive(Debug, Validate)]
struct ConfigConstraints {
    #[garde(range(min = 1))]
    port: u16,
    #[garde(range(min = 1))]
    rate_limit_per_minute: u64,
    #[garde(range(min = 1))]
    rate_limit_burst: u64,
    #[garde(range(min = 1))]
    pool_max: usize,
    #[garde(range(min = 1))]
    exec_workers: usize,
    #[garde(range(min = 1))]
    cache_capacity: usize,
    #[garde(length(min = 1))]
    log_level: String,
}

fn validate_constraints(config: &AppConfig) -> Result<(), ConfigError> {
    let constraints = ConfigConstraints {
        port: config.port,
        rate_limit_per_minute: config.rate_limit_per_minute,
        rate_limit_burst: config.rate_limit_burst,
        pool_max: config.pool_max,
        exec_workers: config.exec_workers,
        cache_capacity: config.cache_capacity,
        log_level: config.log_level.clone(),
    };
    constraints.validate().map_err(|report| ConfigError::Invalid {
        key: "config",
        reason: report
            .iter()
            .map(|(path, err)| format!("{path}: {err}"))
            .collect::<Vec<_>>()
            .join("; "),
    })
}

const WEAK_KEYS: &[&str] = &["change-me", "changeme", "secret", "password", "test"];

fn is_weak_key(key: &[u8]) -> Option<String> {
    if key.len() < 32 {
        return Some(format!("key is only {} bytes, need >= 32", key.len()));
    }
    if let Ok(text) = std::str::from_utf8(key) {
        let lower = text.to_ascii_lowercase();
        if WEAK_KEYS.iter().any(|w| lower == *w) {
            return Some("key matches a well-known weak value".to_string());
        }
    }
    if key.iter().all(|&b| b == key[0]) {
        return Some("key is a single repeated byte".to_string());
    }
    None
}

fn env_string(key: &'static str, default: Option<&str>) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => default
            .map(|d| d.to_string())
            .ok_or(ConfigError::Missing(key)),
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("could not parse '{v}'"),
        }),
        _ => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from the process environment (optionally seeded
    /// from a `.env` file via `dotenvy`.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let environment = match env_string("ENV", Some("production"))?.as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        };

        let auth_signing_key = env_string("AUTH_SIGNING_KEY", None)?.into_bytes();
        if environment == Environment::Production {
            if let Some(reason) = is_weak_key(&auth_signing_key) {
                return Err(ConfigError::WeakSigningKey(reason));
            }
        }

        let log_format = match env_string("LOG_FORMAT", Some("text"))?.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let config = Self {
            bind_addr: env_string("BIND_ADDR", Some("0.0.0.0"))?,
            port: env_parse("PORT", 8080u16)?,
            environment,
            allowed_origins: env_string("ALLOWED_ORIGINS", Some(""))?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),

            auth_signing_key,
            auth_token_ttl: Duration::from_secs(env_parse::<u64>("AUTH_TOKEN_TTL_HOURS", 24)? * 3600),

            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE", 60)?,
            rate_limit_per_hour: env_parse("RATE_LIMIT_PER_HOUR", 1_000)?,
            rate_limit_per_day: env_parse("RATE_LIMIT_PER_DAY", 10_000)?,
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", 10)?,

            graph_uri: env_string("GRAPH_URI", Some("bolt://127.0.0.1:7687"))?,
            graph_user: env_string("GRAPH_USER", Some("neo4j"))?,
            graph_password: env_string("GRAPH_PASSWORD", Some(""))?,
            graph_database: env_string("GRAPH_DATABASE", Some("neo4j"))?,

            pool_max: env_parse("POOL_MAX", default_pool_max())?,
            pool_acquire_timeout: Duration::from_secs(env_parse::<u64>("POOL_ACQ_TIMEOUT_S", 5)?),
            conn_lifetime: Duration::from_secs(env_parse::<u64>("CONN_LIFETIME_S", 3600)?),

            exec_workers: env_parse("EXEC_WORKERS", default_exec_workers())?,
            exec_timeout_max: Duration::from_secs(env_parse::<u64>("EXEC_TIMEOUT_S_MAX", 30)?),
            exec_mem_bytes: env_parse("EXEC_MEM_BYTES", 256 * 1024 * 1024)?,
            exec_output_bytes: env_parse("EXEC_OUTPUT_BYTES", 100 * 1024)?,

            cache_capacity: env_parse("CACHE_CAPACITY", 10_000)?,
            cache_ttl: Duration::from_secs(env_parse::<u64>("CACHE_TTL_S", 300)?),

            breaker_read_failures: env_parse("BREAKER_READ_F", 5)?,
            breaker_read_successes: env_parse("BREAKER_READ_S", 2)?,
            breaker_read_timeout: Duration::from_secs(env_parse::<u64>("BREAKER_READ_T", 30)?),
            breaker_write_failures: env_parse("BREAKER_WRITE_F", 3)?,
            breaker_write_successes: env_parse("BREAKER_WRITE_S", 2)?,
            breaker_write_timeout: Duration::from_secs(env_parse::<u64>("BREAKER_WRITE_T", 60)?),

            log_level: env_string("LOG_LEVEL", Some("info"))?,
            log_format,
        };

        validate_constraints(&config)?;
        Ok(config)
    }
}

fn default_pool_max() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    (2 * cpus + 4).min(100)
}

fn default_exec_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_key_detection() {
        assert!(is_weak_key(b"change-me").is_some());
        assert!(is_weak_key(&[b'a'; 40]).is_some());
        assert!(is_weak_key(b"short").is_some());
        assert!(is_weak_key(b"this-is-a-sufficiently-random-32byte-key").is_none());
    }

    fn sample_config() -> AppConfig {
        AppConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::Development,
            allowed_origins: vec![],
            auth_signing_key: vec![0u8; 32],
            auth_token_ttl: Duration::from_secs(3600),
            rate_limit_per_minute: 60,
            rate_limit_per_hour: 1_000,
            rate_limit_per_day: 10_000,
            rate_limit_burst: 10,
            graph_uri: "bolt://127.0.0.1:7687".to_string(),
            graph_user: "neo4j".to_string(),
            graph_password: String::new(),
            graph_database: "neo4j".to_string(),
            pool_max: 10,
            pool_acquire_timeout: Duration::from_secs(5),
            conn_lifetime: Duration::from_secs(3600),
            exec_workers: 2,
            exec_timeout_max: Duration::from_secs(30),
            exec_mem_bytes: 256 * 1024 * 1024,
            exec_output_bytes: 100 * 1024,
            cache_capacity: 10_000,
            cache_ttl: Duration::from_secs(300),
            breaker_read_failures: 5,
            breaker_read_successes: 2,
            breaker_read_timeout: Duration::from_secs(30),
            breaker_write_failures: 3,
            breaker_write_successes: 2,
            breaker_write_timeout: Duration::from_secs(60),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn validate_constraints_accepts_sane_config() {
        assert!(validate_constraints(&sample_config()).is_ok());
    }

    #[test]
    fn validate_constraints_rejects_zero_port() {
        let mut config = sample_config();
        config.port = 0;
        assert!(validate_constraints(&config).is_err());
    }

    #[test]
    fn validate_constraints_rejects_empty_log_level() {
        let mut config = sample_config();
        config.log_level = String::new();
        assert!(validate_constraints(&config).is_err());
    }
}
