//! crates/bite_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or blob stores.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

use crate::domain::{Category, NewRecipe, Recipe, RecipeDetail, User, UserCredentials};
use crate::validation::ValidationErrors;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, storage).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("Validation failed: {0}")]
    Invalid(ValidationErrors),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user of a live session; expired sessions are `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Categories ---
    async fn list_categories(&self) -> PortResult<Vec<Category>>;

    async fn create_category(&self, name: &str, description: Option<&str>)
        -> PortResult<Category>;

    // --- Recipes ---
    /// The `limit` most recently created recipes, newest first.
    async fn list_recent_recipes(&self, limit: i64) -> PortResult<Vec<Recipe>>;

    /// A recipe with its ingredients and steps, or `None` if it does not exist.
    async fn get_recipe_detail(&self, recipe_id: Uuid) -> PortResult<Option<RecipeDetail>>;

    /// Persists the recipe, its ingredients, its steps and their images as one unit.
    /// Either every row is written or none is.
    async fn create_recipe(&self, recipe: NewRecipe) -> PortResult<Recipe>;

    /// Deletes a recipe and everything that hangs off it. Returns `false` if no such recipe.
    async fn delete_recipe(&self, recipe_id: Uuid) -> PortResult<bool>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` under `key` and returns the stored object's path.
    /// Never replaces an existing object: a taken key is `PortError::AlreadyExists`.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> PortResult<String>;

    /// The publicly resolvable URL for an object previously returned by `upload`.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Output encoding for compressed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// Bounds and quality applied when recompressing an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Between 0 and 1.
    pub quality: f32,
    pub format: ImageFormat,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
            quality: 0.8,
            format: ImageFormat::Jpeg,
        }
    }
}

/// The encoded bytes of a compressed image, ready to be uploaded.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Bytes,
    pub format: ImageFormat,
}

#[async_trait]
pub trait ImageCompressor: Send + Sync {
    /// Resizes and re-encodes the image stored at `source`.
    async fn compress(&self, source: &Path, options: &CompressOptions)
        -> PortResult<CompressedImage>;
}
