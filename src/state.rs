use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::encoder::Encoder;
use crate::infrastructure::storage::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<dyn BlobStore>,
    pub encoder: Arc<dyn Encoder>,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Arc<dyn BlobStore>, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            config,
            storage,
            encoder,
        }
    }
}
