use async_trait::async_trait;
use db::DBService;
use services::services::{
    auth::{AuthError, AuthService},
    config::{Config, ConfigError},
    criteria::CriterionService,
    uploads::PhotoStore,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Everything a request handler may reach: configuration, storage and the
/// long-lived services.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn auth(&self) -> &AuthService;

    fn criteria(&self) -> &CriterionService;

    fn photos(&self) -> &PhotoStore;

    /// Creates the configured administrator on first start.
    async fn bootstrap(&self) -> Result<(), DeploymentError> {
        let Some(admin) = &self.config().admin else {
            return Ok(());
        };
        if let Some(user) = self.auth().ensure_default_admin(&self.db().pool, admin).await? {
            info!(user_id = %user.id, "Bootstrap administrator ready");
        }
        Ok(())
    }
}
