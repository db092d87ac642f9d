use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Probe the fact store and report `degraded` when it does not answer.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthStatus::Ok.into(),
        Err(err) => {
            warn!(error = %err, "fact store health check failed");
            HealthStatus::Degraded.into()
        }
    }
}
