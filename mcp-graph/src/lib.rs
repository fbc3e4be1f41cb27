//! Pooled async graph-driver wrapper: retry, circuit breaker, and
//! cached reads over the external graph database.

pub mod client;
pub mod retry;
pub mod row;

pub use client::{GraphClient, GraphClientConfig, GraphMetrics};
pub use row::{is_flat_scalar_or_sequence, row_to_json};
