//! services/api/src/web/drafts.rs
//!
//! Draft submission: the authoring flow of a client, run server-side. The
//! staged images arrive as multipart parts next to the recipe form, go through
//! the upload pipeline, and the resulting URLs are attached to the recipe
//! before it is created.

use crate::web::rest::{
    error_response, port_error_response, CreateRecipeRequest, HandlerError, RecipeResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use bite_core::domain::{CreateRecipeInput, ImageUpdate, NewPendingImage, PendingImage};
use bite_core::ports::PortError;
use bite_core::{attach_uploads, RecipeDraft, UploadProgress};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const RECIPE_FIELD: &str = "recipe";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDraftParams {
    /// Create the recipe even if some images failed to upload.
    #[serde(default)]
    pub allow_partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImageResponse {
    pub id: Uuid,
    pub role: String,
    pub step_index: Option<usize>,
    pub uploaded_url: Option<String>,
    pub error: Option<String>,
}

impl From<&PendingImage> for UploadedImageResponse {
    fn from(img: &PendingImage) -> Self {
        Self {
            id: img.id,
            role: img.role.as_str().to_string(),
            step_index: img.step_index,
            uploaded_url: img.uploaded_url.clone(),
            error: img.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadProgressResponse {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub percentage: u8,
}

impl From<UploadProgress> for UploadProgressResponse {
    fn from(p: UploadProgress) -> Self {
        Self {
            total: p.total,
            completed: p.completed,
            failed: p.failed,
            percentage: p.percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitDraftResponse {
    /// `None` when failed uploads stopped the submission.
    pub recipe: Option<RecipeResponse>,
    pub images: Vec<UploadedImageResponse>,
    pub progress: UploadProgressResponse,
}

/// Which slot of the recipe a multipart image part fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageSlot {
    Cover,
    Step(usize),
}

/// Parses `cover` or `step-<index>`.
fn parse_image_field(name: &str) -> Option<ImageSlot> {
    if name == "cover" {
        return Some(ImageSlot::Cover);
    }
    name.strip_prefix("step-")?
        .parse::<usize>()
        .ok()
        .map(ImageSlot::Step)
}

fn bad_request(message: impl Into<String>) -> HandlerError {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Submit a recipe draft: upload its images, then create the recipe.
///
/// Multipart parts: `recipe` (the `recipe.create` JSON payload), and any number
/// of image files named `cover` or `step-<index>`.
#[utoipa::path(
    post,
    path = "/api/drafts/submit",
    params(SubmitDraftParams),
    request_body(content_type = "multipart/form-data", description = "The recipe JSON and its images."),
    responses(
        (status = 201, description = "Images uploaded and recipe created", body = SubmitDraftResponse),
        (status = 400, description = "Malformed form, too many images or validation failure", body = crate::web::rest::ErrorBody),
        (status = 401, description = "Not signed in"),
        (status = 422, description = "Some images failed to upload; nothing was created", body = SubmitDraftResponse)
    )
)]
pub async fn submit_draft_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<SubmitDraftParams>,
    mut multipart: Multipart,
) -> Result<Response, HandlerError> {
    let staging = tempfile::tempdir().map_err(|e| {
        error!("Failed to create staging directory: {:?}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })?;

    // --- 1. Stage every part ---
    let mut draft = RecipeDraft::new(state.config.max_step_images);
    let mut recipe: Option<CreateRecipeRequest> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == RECIPE_FIELD {
            let text = field
                .text()
                .await
                .map_err(|e| bad_request(format!("Failed to read recipe: {}", e)))?;
            let parsed = serde_json::from_str(&text)
                .map_err(|e| bad_request(format!("Invalid recipe JSON: {}", e)))?;
            recipe = Some(parsed);
            continue;
        }

        let slot = parse_image_field(&name)
            .ok_or_else(|| bad_request(format!("Unexpected multipart field '{}'", name)))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read image bytes: {}", e)))?;

        let path = staging.path().join(Uuid::new_v4().to_string());
        tokio::fs::write(&path, &data).await.map_err(|e| {
            error!("Failed to stage image: {:?}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?;

        let image = match slot {
            ImageSlot::Cover => NewPendingImage::cover(path),
            ImageSlot::Step(index) => NewPendingImage::step(path, index),
        };
        draft
            .add_image(image)
            .map_err(|e| bad_request(e.to_string()))?;
    }

    let input: CreateRecipeInput = recipe
        .ok_or_else(|| bad_request("Multipart form must include a 'recipe' part"))?
        .into();
    // Nothing is uploaded for a submission that cannot be created.
    input
        .validate()
        .map_err(|e| port_error_response(PortError::Invalid(e)))?;
    draft
        .check_step_indexes(input.steps.len())
        .map_err(|e| bad_request(e.to_string()))?;

    // --- 2. Upload the staged images ---
    let ids: Vec<Uuid> = draft.images().iter().map(|img| img.id).collect();
    for id in ids {
        draft.update_image(
            id,
            ImageUpdate {
                is_uploading: Some(true),
                ..Default::default()
            },
        );
    }

    let pipeline = state.upload_pipeline();
    let results = pipeline
        .upload_multiple_images(draft.images().to_vec(), state.config.upload_concurrency)
        .await;
    draft.apply_results(&results);

    let progress = pipeline.status().progress;
    let images: Vec<UploadedImageResponse> = draft.images().iter().map(Into::into).collect();

    if progress.failed > 0 && !params.allow_partial {
        warn!(
            failed = progress.failed,
            total = progress.total,
            "Draft submission stopped by failed uploads"
        );
        let body = SubmitDraftResponse {
            recipe: None,
            images,
            progress: progress.into(),
        };
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
    }

    // --- 3. Create the recipe with the uploaded URLs ---
    let input = attach_uploads(input, draft.images());
    let recipe = state
        .recipes
        .create(Some(user_id), input)
        .await
        .map_err(port_error_response)?;
    draft.clear_images();
    info!(recipe_id = %recipe.id, images = images.len(), "Draft submitted");

    let body = SubmitDraftResponse {
        recipe: Some(recipe.into()),
        images,
        progress: progress.into(),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_fields_name_their_slot() {
        assert_eq!(parse_image_field("cover"), Some(ImageSlot::Cover));
        assert_eq!(parse_image_field("step-0"), Some(ImageSlot::Step(0)));
        assert_eq!(parse_image_field("step-12"), Some(ImageSlot::Step(12)));
        assert_eq!(parse_image_field("step-"), None);
        assert_eq!(parse_image_field("step--1"), None);
        assert_eq!(parse_image_field("avatar"), None);
    }
}
