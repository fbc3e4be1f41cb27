use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

/// A single dependency health probe, modeled on a
/// `HealthIndicator` trait: anything the server depends on (graph driver,
/// circuit breakers) implements this so readiness reflects real state
/// instead of a bare liveness flag.
#[async_trait]
pub trait HealthIndicator: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> HealthStatus;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Degraded,
    Down,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
}

#[derive(Debug, Serialize)]
pub struct AggregateHealth {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
}

/// Aggregates registered [`HealthIndicator`]s into one readiness verdict:
/// the worst status reported by any component.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    indicators: Vec<Arc<dyn HealthIndicator>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, indicator: Arc<dyn HealthIndicator>) {
        self.indicators.push(indicator);
    }

    pub async fn check(&self) -> AggregateHealth {
        let mut components = Vec::with_capacity(self.indicators.len());
        let mut worst = HealthStatus::Up;
        for indicator in &self.indicators {
            let status = indicator.check().await;
            worst = worse_of(worst, status);
            components.push(ComponentHealth {
                name: indicator.name().to_string(),
                status,
            });
        }
        AggregateHealth {
            status: worst,
            components,
        }
    }
}

fn worse_of(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    use HealthStatus::*;
    match (a, b) {
        (Down, _) | (_, Down) => Down,
        (Degraded, _) | (_, Degraded) => Degraded,
        _ => Up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(HealthStatus);

    #[async_trait]
    impl HealthIndicator for Always {
        fn name(&self) -> &str {
            "always"
        }
        async fn check(&self) -> HealthStatus {
            self.0
        }
    }

    #[tokio::test]
    async fn aggregates_to_worst_status() {
        let mut registry = HealthRegistry::new();
        registry.register(Arc::new(Always(HealthStatus::Up)));
        registry.register(Arc::new(Always(HealthStatus::Degraded)));
        let result = registry.check().await;
        assert_eq!(result.status, HealthStatus::Degraded);
        assert_eq!(result.components.len(), 2);
    }

    #[tokio::test]
    async fn empty_registry_is_up() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.check().await.status, HealthStatus::Up);
    }
}
