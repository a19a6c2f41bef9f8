use async_trait::async_trait;

use crate::domain::HealthSignal;

/// One dependency the health aggregate samples.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn signal(&self) -> HealthSignal;

    async fn check(&self) -> Result<(), String>;
}
