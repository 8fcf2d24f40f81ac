pub mod handler;

pub async fn health_checks() -> handler::HealthCheck {
    handler::HealthCheck::new()
}
