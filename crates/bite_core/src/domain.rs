//! crates/bite_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

//=========================================================================================
// Users and Auth
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Persisted Recipe Entities
//=========================================================================================

/// A recipe row. Owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub name: String,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub order: i32,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepImage {
    pub id: Uuid,
    pub step_id: Uuid,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// A step together with the images attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepWithImages {
    pub step: Step,
    pub images: Vec<StepImage>,
}

/// A recipe with all of its children, ordered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<StepWithImages>,
}

//=========================================================================================
// Recipe Submission
//=========================================================================================

/// An ingredient as submitted by a client. A missing `order` means "use the list position".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientInput {
    pub name: String,
    pub order: Option<i32>,
}

/// A step as submitted by a client, with the URLs of images that were already uploaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepInput {
    pub instruction: String,
    pub order: Option<i32>,
    pub images: Vec<String>,
}

/// The full recipe submission, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRecipeInput {
    pub title: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub cook_time: Option<String>,
    pub serving: Option<String>,
    pub origin: Option<String>,
    pub category_id: Option<Uuid>,
    /// Only consulted when no session user is available.
    pub user_id: Option<Uuid>,
    pub ingredients: Vec<IngredientInput>,
    pub steps: Vec<StepInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIngredient {
    pub name: String,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStep {
    pub instruction: String,
    pub order: i32,
    pub image_urls: Vec<String>,
}

/// A validated submission with its owner resolved and every `order` filled in.
/// This is what the database port persists as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub cook_time: Option<String>,
    pub serving: Option<String>,
    pub origin: Option<String>,
    pub category_id: Option<Uuid>,
    pub user_id: Uuid,
    pub ingredients: Vec<NewIngredient>,
    pub steps: Vec<NewStep>,
}

/// The order implied by a list position, saturating at `i32::MAX`.
pub fn position_order(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

impl NewRecipe {
    /// Builds the write model from a submission, falling back to the list
    /// position for any ingredient or step without an explicit order.
    pub fn from_input(input: CreateRecipeInput, user_id: Uuid) -> Self {
        let ingredients = input
            .ingredients
            .into_iter()
            .enumerate()
            .map(|(index, ingredient)| NewIngredient {
                name: ingredient.name.trim().to_string(),
                order: ingredient.order.unwrap_or_else(|| position_order(index)),
            })
            .collect();

        let steps = input
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| NewStep {
                instruction: step.instruction,
                order: step.order.unwrap_or_else(|| position_order(index)),
                image_urls: step.images,
            })
            .collect();

        Self {
            title: input.title.trim().to_string(),
            description: input.description,
            cover_image: input.cover_image,
            cook_time: input.cook_time,
            serving: input.serving,
            origin: input.origin,
            category_id: input.category_id,
            user_id,
            ingredients,
            steps,
        }
    }
}

//=========================================================================================
// Staged Images (client-side, never persisted in this form)
//=========================================================================================

/// Where a staged image will be placed within the recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    Cover,
    Step,
}

impl ImageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageRole::Cover => "cover",
            ImageRole::Step => "step",
        }
    }
}

/// A locally selected photo waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub id: Uuid,
    pub source: PathBuf,
    pub role: ImageRole,
    pub step_index: Option<usize>,
    pub is_uploading: bool,
    pub uploaded_url: Option<String>,
    pub error: Option<String>,
}

/// A `PendingImage` before the draft store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPendingImage {
    pub source: PathBuf,
    pub role: ImageRole,
    pub step_index: Option<usize>,
}

impl NewPendingImage {
    pub fn cover(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            role: ImageRole::Cover,
            step_index: None,
        }
    }

    pub fn step(source: impl Into<PathBuf>, step_index: usize) -> Self {
        Self {
            source: source.into(),
            role: ImageRole::Step,
            step_index: Some(step_index),
        }
    }
}

/// Partial fields merged into a `PendingImage` by the draft store.
/// `None` leaves the existing value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUpdate {
    pub is_uploading: Option<bool>,
    pub uploaded_url: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_order_saturates_instead_of_wrapping() {
        assert_eq!(position_order(0), 0);
        assert_eq!(position_order(41), 41);
        assert_eq!(position_order(i32::MAX as usize + 1), i32::MAX);
        assert_eq!(position_order(usize::MAX), i32::MAX);
    }

    #[test]
    fn explicit_zero_order_is_kept_and_missing_order_uses_position() {
        let input = CreateRecipeInput {
            title: "  Tarta ".to_string(),
            description: "rica".to_string(),
            ingredients: vec![
                IngredientInput { name: "harina".to_string(), order: None },
                IngredientInput { name: "azucar".to_string(), order: Some(0) },
                IngredientInput { name: "huevo".to_string(), order: None },
            ],
            steps: vec![StepInput {
                instruction: "mezclar".to_string(),
                order: Some(7),
                images: vec![],
            }],
            ..Default::default()
        };

        let recipe = NewRecipe::from_input(input, Uuid::new_v4());

        assert_eq!(recipe.title, "Tarta");
        let orders: Vec<i32> = recipe.ingredients.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 0, 2]);
        assert_eq!(recipe.steps[0].order, 7);
    }
}
