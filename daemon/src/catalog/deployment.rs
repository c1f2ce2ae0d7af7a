//! Deployment update check.
//!
//! The one interval in the catalog that comes from configuration; the
//! processor itself is agnostic to where intervals originate.

use std::sync::Arc;

use async_trait::async_trait;

use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::Capabilities;
use crate::caps::DeploymentMonitor;
use crate::config::AppConfig;

pub struct DeploymentCheck(pub Arc<dyn DeploymentMonitor>);

#[async_trait]
impl WorkHandler for DeploymentCheck {
    async fn execute(&self, _: &str, _: &ProgressReporter) -> anyhow::Result<()> {
        self.0.check_for_update().await
    }
}

pub fn register(registry: &Registry, caps: &Capabilities, cfg: &AppConfig) {
    registry.register(
        WorkType::new(
            "deployment:check",
            MarketTiming::AnyTime,
            Arc::new(DeploymentCheck(caps.deployment.clone())),
        )
        .with_interval(cfg.deployment_check_interval),
    );
}
