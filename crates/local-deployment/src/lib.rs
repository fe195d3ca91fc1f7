use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    auth::AuthService, config::Config, criteria::CriterionService, uploads::PhotoStore,
};
use tracing::info;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    auth: AuthService,
    criteria: CriterionService,
    photos: PhotoStore,
}

impl LocalDeployment {
    /// Builds the deployment around an already opened database.
    pub fn with_db(config: Config, db: DBService) -> Self {
        let auth = AuthService::new(&config.jwt_secret);
        let photos = PhotoStore::new(config.upload_dir.clone());
        Self {
            config: Arc::new(config),
            db,
            auth,
            criteria: CriterionService::new(),
            photos,
        }
    }

    pub async fn from_config(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        Ok(Self::with_db(config, db))
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;
        info!(database_url = %config.database_url, "Loaded configuration");
        Self::from_config(config).await
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn criteria(&self) -> &CriterionService {
        &self.criteria
    }

    fn photos(&self) -> &PhotoStore {
        &self.photos
    }
}
