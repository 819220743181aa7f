use crate::auth::repo::UserStore;
use crate::config::AppConfig;
use crate::fetch::{HttpFetcher, ImageFetcher};
use crate::images::repo::ImageStore;
use crate::provider::{ImageGenerator, ProviderClient};
use crate::storage::{DocumentStore, JsonFileStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<UserStore>,
    pub images: Arc<ImageStore>,
    pub generator: Arc<dyn ImageGenerator>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        tokio::fs::create_dir_all(&config.images_dir).await?;

        let users = JsonFileStore::new(&config.users_file);
        let images = JsonFileStore::new(&config.user_images_file);
        tracing::info!(
            users = %users.path().display(),
            images = %images.path().display(),
            images_dir = %config.images_dir.display(),
            "file stores ready"
        );

        let generator = Arc::new(ProviderClient::new(&config.provider)?) as Arc<dyn ImageGenerator>;
        let fetcher =
            Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?) as Arc<dyn ImageFetcher>;

        Ok(Self::from_parts(
            config,
            Arc::new(users),
            Arc::new(images),
            generator,
            fetcher,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn DocumentStore>,
        images: Arc<dyn DocumentStore>,
        generator: Arc<dyn ImageGenerator>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            config,
            users: Arc::new(UserStore::new(users)),
            images: Arc::new(ImageStore::new(images)),
            generator,
            fetcher,
        }
    }
}
