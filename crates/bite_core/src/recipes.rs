//! crates/bite_core/src/recipes.rs
//!
//! The recipe procedures: the read paths, the create write path and delete.
//! Callers (the HTTP layer, tests) resolve the acting user; this module decides
//! what that user may do and turns storage failures into caller-facing errors.

use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{Category, CreateRecipeInput, NewRecipe, Recipe, RecipeDetail};
use crate::ports::{DatabaseService, PortError, PortResult};
use crate::validation::validate_category_name;

/// How many recipes `all` returns.
pub const RECENT_RECIPES_LIMIT: i64 = 10;

pub const CREATE_FAILED_MESSAGE: &str = "failed to create recipe";

#[derive(Clone)]
pub struct RecipeService {
    db: Arc<dyn DatabaseService>,
}

impl RecipeService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// The most recent recipes, newest first.
    pub async fn all(&self) -> PortResult<Vec<Recipe>> {
        self.db.list_recent_recipes(RECENT_RECIPES_LIMIT).await
    }

    /// A single recipe with its children. An unknown id is `Ok(None)`, not an error.
    pub async fn by_id(&self, recipe_id: Uuid) -> PortResult<Option<RecipeDetail>> {
        self.db.get_recipe_detail(recipe_id).await
    }

    /// Validates and persists a submission.
    ///
    /// The owner is the session user when there is one; otherwise `input.user_id`
    /// is taken as given. Write failures are logged and reported as a single
    /// generic error.
    pub async fn create(
        &self,
        session_user: Option<Uuid>,
        input: CreateRecipeInput,
    ) -> PortResult<Recipe> {
        let user_id = session_user
            .or(input.user_id)
            .ok_or(PortError::Unauthorized)?;
        input.validate().map_err(PortError::Invalid)?;

        let new_recipe = NewRecipe::from_input(input, user_id);
        let (ingredients, steps) = (new_recipe.ingredients.len(), new_recipe.steps.len());

        match self.db.create_recipe(new_recipe).await {
            Ok(recipe) => {
                info!(recipe_id = %recipe.id, %user_id, ingredients, steps, "Recipe created");
                Ok(recipe)
            }
            Err(e) => {
                error!(%user_id, error = ?e, "Failed to create recipe");
                Err(PortError::Unexpected(CREATE_FAILED_MESSAGE.to_string()))
            }
        }
    }

    /// Deletes a recipe and its children. Any authenticated user may delete.
    pub async fn delete(&self, actor: Option<Uuid>, recipe_id: Uuid) -> PortResult<()> {
        let actor = actor.ok_or(PortError::Unauthorized)?;
        if !self.db.delete_recipe(recipe_id).await? {
            return Err(PortError::NotFound(format!("Recipe {} not found", recipe_id)));
        }
        info!(%recipe_id, %actor, "Recipe deleted");
        Ok(())
    }

    pub async fn categories(&self) -> PortResult<Vec<Category>> {
        self.db.list_categories().await
    }

    pub async fn create_category(
        &self,
        actor: Option<Uuid>,
        name: &str,
        description: Option<&str>,
    ) -> PortResult<Category> {
        actor.ok_or(PortError::Unauthorized)?;
        validate_category_name(name).map_err(PortError::Invalid)?;
        self.db.create_category(name.trim(), description).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IngredientInput, StepInput};
    use crate::memory::InMemoryDatabase;
    use pretty_assertions::assert_eq;

    async fn setup() -> (RecipeService, Arc<InMemoryDatabase>, Uuid) {
        let db = Arc::new(InMemoryDatabase::new());
        let user = db
            .create_user_with_email("cook@bite.test", Some("Cook"), "hash")
            .await
            .unwrap();
        (RecipeService::new(db.clone()), db, user.user_id)
    }

    fn tarta() -> CreateRecipeInput {
        CreateRecipeInput {
            title: "Tarta".to_string(),
            description: "rica".to_string(),
            ingredients: vec![IngredientInput {
                name: "harina".to_string(),
                order: Some(0),
            }],
            steps: vec![StepInput {
                instruction: "mezclar".to_string(),
                order: Some(0),
                images: vec![],
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_without_any_user_is_unauthorized() {
        let (service, db, _) = setup().await;
        let result = service.create(None, tarta()).await;
        assert!(matches!(result, Err(PortError::Unauthorized)));
        assert_eq!(db.counts().await.recipes, 0);
    }

    #[tokio::test]
    async fn empty_ingredients_are_rejected_before_any_write() {
        let (service, db, user) = setup().await;
        let input = CreateRecipeInput {
            ingredients: vec![],
            ..tarta()
        };

        let result = service.create(Some(user), input).await;

        assert!(matches!(result, Err(PortError::Invalid(_))));
        assert_eq!(db.counts().await.recipes, 0);
    }

    #[tokio::test]
    async fn step_images_reference_their_own_step() {
        let (service, db, user) = setup().await;
        let input = CreateRecipeInput {
            steps: vec![
                StepInput {
                    instruction: "precalentar".to_string(),
                    order: None,
                    images: vec![],
                },
                StepInput {
                    instruction: "hornear".to_string(),
                    order: None,
                    images: vec!["https://cdn/a.jpg".to_string(), "https://cdn/b.jpg".to_string()],
                },
            ],
            ..tarta()
        };

        let recipe = service.create(Some(user), input).await.unwrap();

        let counts = db.counts().await;
        assert_eq!(
            (counts.recipes, counts.ingredients, counts.steps, counts.step_images),
            (1, 1, 2, 2)
        );

        let detail = service.by_id(recipe.id).await.unwrap().unwrap();
        let second = &detail.steps[1];
        assert_eq!(second.step.order, 1);
        assert_eq!(second.images.len(), 2);
        assert!(second.images.iter().all(|img| img.step_id == second.step.id));
        assert!(detail.steps[0].images.is_empty());
    }

    #[tokio::test]
    async fn supplied_user_id_is_used_without_a_session() {
        let (service, _, user) = setup().await;
        let input = CreateRecipeInput {
            user_id: Some(user),
            ..tarta()
        };
        let recipe = service.create(None, input).await.unwrap();
        assert_eq!(recipe.user_id, user);
        assert!(!recipe.is_published);
    }

    #[tokio::test]
    async fn write_failures_collapse_to_a_generic_error_and_leave_nothing_behind() {
        let (service, db, user) = setup().await;
        let input = CreateRecipeInput {
            category_id: Some(Uuid::new_v4()),
            ..tarta()
        };

        let err = service.create(Some(user), input).await.unwrap_err();

        assert_eq!(err.to_string(), format!("An unexpected error occurred: {}", CREATE_FAILED_MESSAGE));
        let counts = db.counts().await;
        assert_eq!((counts.recipes, counts.ingredients, counts.steps), (0, 0, 0));
    }

    #[tokio::test]
    async fn unknown_id_is_absent_not_an_error() {
        let (service, _, _) = setup().await;
        assert_eq!(service.by_id(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn create_list_delete_round_trip() {
        let (service, db, user) = setup().await;

        let created = service.create(Some(user), tarta()).await.unwrap();
        let all = service.all().await.unwrap();
        assert!(all.iter().any(|r| r.title == "Tarta"));

        service.delete(Some(user), created.id).await.unwrap();
        assert_eq!(service.by_id(created.id).await.unwrap(), None);

        let counts = db.counts().await;
        assert_eq!((counts.ingredients, counts.steps), (0, 0));
    }

    #[tokio::test]
    async fn delete_requires_an_actor_and_an_existing_recipe() {
        let (service, _, user) = setup().await;
        let created = service.create(Some(user), tarta()).await.unwrap();

        assert!(matches!(
            service.delete(None, created.id).await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            service.delete(Some(user), Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn all_returns_the_ten_newest() {
        let (service, _, user) = setup().await;
        for i in 0..12 {
            let input = CreateRecipeInput {
                title: format!("Receta {}", i),
                ..tarta()
            };
            service.create(Some(user), input).await.unwrap();
        }

        let titles: Vec<String> = service.all().await.unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles.len(), 10);
        assert_eq!(titles[0], "Receta 11");
        assert_eq!(titles[9], "Receta 2");
    }

    #[tokio::test]
    async fn categories_can_be_created_and_referenced() {
        let (service, _, user) = setup().await;
        let category = service
            .create_category(Some(user), " Postres ", Some("Dulces"))
            .await
            .unwrap();
        assert_eq!(category.name, "Postres");
        assert!(matches!(
            service.create_category(Some(user), "Postres", None).await,
            Err(PortError::AlreadyExists(_))
        ));

        let input = CreateRecipeInput {
            category_id: Some(category.id),
            ..tarta()
        };
        let recipe = service.create(Some(user), input).await.unwrap();
        assert_eq!(recipe.category_id, Some(category.id));
        assert_eq!(service.categories().await.unwrap(), vec![category]);
    }
}
