use crate::utils::{ApiTags, PROJECT_NAME};
use poem_openapi::{payload::Json, Object, OpenApi};
use serde::Serialize;

#[derive(Debug, Object, Clone, Serialize)]
pub struct HealthStatus {
    /// Service liveness indicator
    pub status: String,
    /// Configured project name
    pub project: String,
}

pub struct HealthCheck;

#[OpenApi(tag = "ApiTags::HealthCheck")]
impl HealthCheck {
    pub fn new() -> Self {
        Self
    }

    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> Json<HealthStatus> {
        Json(HealthStatus {
            status: "online".to_string(),
            project: PROJECT_NAME.clone(),
        })
    }
}
