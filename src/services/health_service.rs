use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the storage backend and report whether it answered.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let year = state.league().year().await;
    match state.documents().health_check().await {
        Ok(()) => HealthResponse::ok(year),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(year)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::document_store::memory::MemoryDocumentStore, state::AppState,
    };

    #[tokio::test]
    async fn offline_storage_reports_degraded() {
        let documents = MemoryDocumentStore::new();
        let state = AppState::new(Arc::new(documents.clone()), AppConfig::default(), 2024).await;
        assert_eq!(health_status(&state).await.status, "ok");

        documents.set_offline(true);
        let status = health_status(&state).await;
        assert_eq!(status.status, "degraded");
        assert_eq!(status.year, 2024);
    }
}
