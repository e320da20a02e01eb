//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the recipe procedures, the wire types they
//! exchange, and the master definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use bite_core::domain::{
    Category, CreateRecipeInput, Ingredient, IngredientInput, Recipe, RecipeDetail, StepInput,
    StepWithImages,
};
use bite_core::ports::PortError;
use bite_core::recipes::CREATE_FAILED_MESSAGE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        recipe_all_handler,
        recipe_by_id_handler,
        recipe_create_handler,
        recipe_delete_handler,
        category_all_handler,
        category_create_handler,
        crate::web::drafts::submit_draft_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::session_handler,
    ),
    components(
        schemas(
            ErrorBody,
            FieldErrorBody,
            CreateRecipeRequest,
            IngredientRequest,
            StepRequest,
            DeleteRecipeRequest,
            CreateCategoryRequest,
            RecipeResponse,
            RecipeDetailResponse,
            IngredientResponse,
            StepResponse,
            StepImageResponse,
            CategoryResponse,
            crate::web::drafts::SubmitDraftResponse,
            crate::web::drafts::UploadedImageResponse,
            crate::web::drafts::UploadProgressResponse,
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
        )
    ),
    tags(
        (name = "Bite API", description = "Recipe procedures, draft submission and auth.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FieldErrorBody {
    pub field: String,
    pub message: String,
}

/// The body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldErrorBody>,
}

pub type HandlerError = (StatusCode, Json<ErrorBody>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
            fields: Vec::new(),
        }),
    )
}

/// Maps a port error to its HTTP status. Unexpected errors keep their detail in the logs only.
pub fn port_error_response(e: PortError) -> HandlerError {
    match e {
        PortError::Invalid(errors) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Validation failed".to_string(),
                fields: errors
                    .errors()
                    .iter()
                    .map(|f| FieldErrorBody {
                        field: f.field.clone(),
                        message: f.message.clone(),
                    })
                    .collect(),
            }),
        ),
        PortError::Unauthorized => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
        PortError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
        PortError::AlreadyExists(msg) => error_response(StatusCode::CONFLICT, msg),
        PortError::Unexpected(msg) if msg == CREATE_FAILED_MESSAGE => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create recipe")
        }
        PortError::Unexpected(msg) => {
            error!("Unexpected error: {}", msg);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngredientRequest {
    #[serde(default)]
    pub name: String,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    #[serde(default)]
    pub instruction: String,
    pub order: Option<i32>,
    /// URLs of images that were already uploaded.
    #[serde(default)]
    pub images: Vec<String>,
}

/// The payload of `recipe.create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecipeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub cover_image: Option<String>,
    pub cook_time: Option<String>,
    pub serving: Option<String>,
    pub origin: Option<String>,
    pub category_id: Option<Uuid>,
    /// Ignored when the request carries a session.
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub ingredients: Vec<IngredientRequest>,
    #[serde(default)]
    pub steps: Vec<StepRequest>,
}

impl From<CreateRecipeRequest> for CreateRecipeInput {
    fn from(req: CreateRecipeRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            cover_image: req.cover_image,
            cook_time: req.cook_time,
            serving: req.serving,
            origin: req.origin,
            category_id: req.category_id,
            user_id: req.user_id,
            ingredients: req
                .ingredients
                .into_iter()
                .map(|i| IngredientInput {
                    name: i.name,
                    order: i.order,
                })
                .collect(),
            steps: req
                .steps
                .into_iter()
                .map(|s| StepInput {
                    instruction: s.instruction,
                    order: s.order,
                    images: s.images,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteRecipeRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ByIdQuery {
    pub id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub cook_time: Option<String>,
    pub serving: Option<String>,
    pub origin: Option<String>,
    pub category_id: Option<Uuid>,
    pub user_id: Uuid,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Recipe> for RecipeResponse {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            cover_image: r.cover_image,
            cook_time: r.cook_time,
            serving: r.serving,
            origin: r.origin,
            category_id: r.category_id,
            user_id: r.user_id,
            is_published: r.is_published,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngredientResponse {
    pub id: Uuid,
    pub name: String,
    pub order: i32,
}

impl From<Ingredient> for IngredientResponse {
    fn from(i: Ingredient) -> Self {
        Self {
            id: i.id,
            name: i.name,
            order: i.order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepImageResponse {
    pub id: Uuid,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StepResponse {
    pub id: Uuid,
    pub order: i32,
    pub instruction: String,
    pub images: Vec<StepImageResponse>,
}

impl From<StepWithImages> for StepResponse {
    fn from(s: StepWithImages) -> Self {
        Self {
            id: s.step.id,
            order: s.step.order,
            instruction: s.step.instruction,
            images: s
                .images
                .into_iter()
                .map(|img| StepImageResponse {
                    id: img.id,
                    image_url: img.image_url,
                })
                .collect(),
        }
    }
}

/// A recipe with its ingredients and steps, as returned by `recipe.byId`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeDetailResponse {
    #[serde(flatten)]
    pub recipe: RecipeResponse,
    pub ingredients: Vec<IngredientResponse>,
    pub steps: Vec<StepResponse>,
}

impl From<RecipeDetail> for RecipeDetailResponse {
    fn from(d: RecipeDetail) -> Self {
        Self {
            recipe: d.recipe.into(),
            ingredients: d.ingredients.into_iter().map(Into::into).collect(),
            steps: d.steps.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
        }
    }
}

//=========================================================================================
// Recipe Procedures
//=========================================================================================

/// `recipe.all` - the ten most recent recipes.
#[utoipa::path(
    get,
    path = "/api/trpc/recipe.all",
    responses(
        (status = 200, description = "Most recent recipes, newest first", body = [RecipeResponse]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn recipe_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RecipeResponse>>, HandlerError> {
    let recipes = state.recipes.all().await.map_err(port_error_response)?;
    Ok(Json(recipes.into_iter().map(Into::into).collect()))
}

/// `recipe.byId` - a single recipe with its children, or `null`.
#[utoipa::path(
    get,
    path = "/api/trpc/recipe.byId",
    params(ByIdQuery),
    responses(
        (status = 200, description = "The recipe, or null when it does not exist", body = Option<RecipeDetailResponse>),
        (status = 400, description = "Malformed id")
    )
)]
pub async fn recipe_by_id_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ByIdQuery>,
) -> Result<Json<Option<RecipeDetailResponse>>, HandlerError> {
    let detail = state
        .recipes
        .by_id(query.id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(detail.map(Into::into)))
}

/// `recipe.create` - persists a recipe with ingredients, steps and step images.
#[utoipa::path(
    post,
    path = "/api/trpc/recipe.create",
    request_body = CreateRecipeRequest,
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Failed to create recipe", body = ErrorBody)
    )
)]
pub async fn recipe_create_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let recipe = state
        .recipes
        .create(Some(user_id), req.into())
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(RecipeResponse::from(recipe))))
}

/// `recipe.delete` - removes a recipe and its children.
#[utoipa::path(
    post,
    path = "/api/trpc/recipe.delete",
    request_body = DeleteRecipeRequest,
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such recipe", body = ErrorBody)
    )
)]
pub async fn recipe_delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<DeleteRecipeRequest>,
) -> Result<StatusCode, HandlerError> {
    state
        .recipes
        .delete(Some(user_id), req.id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Category Procedures
//=========================================================================================

/// `category.all` - every category, by name.
#[utoipa::path(
    get,
    path = "/api/trpc/category.all",
    responses(
        (status = 200, description = "All categories", body = [CategoryResponse])
    )
)]
pub async fn category_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryResponse>>, HandlerError> {
    let categories = state.recipes.categories().await.map_err(port_error_response)?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// `category.create` - adds a category with a unique name.
#[utoipa::path(
    post,
    path = "/api/trpc/category.create",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 409, description = "Name already taken", body = ErrorBody)
    )
)]
pub async fn category_create_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let category = state
        .recipes
        .create_category(Some(user_id), &req.name, req.description.as_deref())
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}
