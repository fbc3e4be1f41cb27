//! Shared error taxonomy, configuration, and observability primitives used by
//! every crate in the Ultimate MCP platform.

pub mod config;
pub mod correlation;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod secure_headers;
pub mod shutdown;

pub use config::{AppConfig, ConfigError, Environment, LogFormat};
pub use correlation::{correlation_id_layer, RequestId};
pub use error::{AppError, AppResult};
pub use health::{AggregateHealth, ComponentHealth, HealthIndicator, HealthRegistry, HealthStatus};
