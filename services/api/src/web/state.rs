//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use bite_core::ports::{DatabaseService, ImageCompressor, ObjectStorage};
use bite_core::{RecipeService, UploadPipeline};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub recipes: RecipeService,
    pub config: Arc<Config>,
    pub storage: Arc<dyn ObjectStorage>,
    pub compressor: Arc<dyn ImageCompressor>,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        config: Arc<Config>,
        storage: Arc<dyn ObjectStorage>,
        compressor: Arc<dyn ImageCompressor>,
    ) -> Self {
        Self {
            recipes: RecipeService::new(db.clone()),
            db,
            config,
            storage,
            compressor,
        }
    }

    /// A fresh pipeline for one batch, so progress is never shared between requests.
    pub fn upload_pipeline(&self) -> UploadPipeline {
        UploadPipeline::new(
            self.storage.clone(),
            self.compressor.clone(),
            self.config.upload_options(),
        )
    }
}
