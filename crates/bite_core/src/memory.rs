//! crates/bite_core/src/memory.rs
//!
//! An in-memory implementation of the `DatabaseService` port. It enforces the
//! same references and uniqueness rules as the relational schema, and applies
//! every multi-row write under a single lock so partial writes are never visible.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Category, Ingredient, NewRecipe, Recipe, RecipeDetail, Step, StepImage,
    StepWithImages, User, UserCredentials,
};
use crate::ports::{DatabaseService, PortError, PortResult};

struct UserRow {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRow>,
    sessions: HashMap<String, AuthSession>,
    categories: Vec<Category>,
    // Kept in creation order.
    recipes: Vec<Recipe>,
    ingredients: Vec<Ingredient>,
    steps: Vec<Step>,
    step_images: Vec<StepImage>,
}

/// Row counts per table, for assertions and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub users: usize,
    pub categories: usize,
    pub recipes: usize,
    pub ingredients: usize,
    pub steps: usize,
    pub step_images: usize,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts(&self) -> TableCounts {
        let t = self.tables.read().await;
        TableCounts {
            users: t.users.len(),
            categories: t.categories.len(),
            recipes: t.recipes.len(),
            ingredients: t.ingredients.len(),
            steps: t.steps.len(),
            step_images: t.step_images.len(),
        }
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|row| row.user.email.as_deref() == Some(email)) {
            return Err(PortError::AlreadyExists(format!("User {}", email)));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: Some(email.to_string()),
            name: name.map(str::to_string),
        };
        t.users.insert(
            user.user_id,
            UserRow {
                user: user.clone(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|row| row.user.email.as_deref() == Some(email))
            .map(|row| UserCredentials {
                user_id: row.user.user_id,
                email: email.to_string(),
                hashed_password: row.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let t = self.tables.read().await;
        t.users
            .get(&user_id)
            .map(|row| row.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user_id) {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        t.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let mut t = self.tables.write().await;
        match t.sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id),
            Some(_) => {
                t.sessions.remove(session_id);
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.write().await.sessions.remove(session_id);
        Ok(())
    }

    async fn list_categories(&self) -> PortResult<Vec<Category>> {
        let mut categories = self.tables.read().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> PortResult<Category> {
        let mut t = self.tables.write().await;
        if t.categories.iter().any(|c| c.name == name) {
            return Err(PortError::AlreadyExists(format!("Category {}", name)));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        t.categories.push(category.clone());
        Ok(category)
    }

    async fn list_recent_recipes(&self, limit: i64) -> PortResult<Vec<Recipe>> {
        let t = self.tables.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(t.recipes.iter().rev().take(limit).cloned().collect())
    }

    async fn get_recipe_detail(&self, recipe_id: Uuid) -> PortResult<Option<RecipeDetail>> {
        let t = self.tables.read().await;
        let Some(recipe) = t.recipes.iter().find(|r| r.id == recipe_id).cloned() else {
            return Ok(None);
        };

        let mut ingredients: Vec<Ingredient> = t
            .ingredients
            .iter()
            .filter(|i| i.recipe_id == recipe_id)
            .cloned()
            .collect();
        ingredients.sort_by_key(|i| i.order);

        let mut steps: Vec<StepWithImages> = t
            .steps
            .iter()
            .filter(|s| s.recipe_id == recipe_id)
            .map(|step| StepWithImages {
                images: t
                    .step_images
                    .iter()
                    .filter(|img| img.step_id == step.id)
                    .cloned()
                    .collect(),
                step: step.clone(),
            })
            .collect();
        steps.sort_by_key(|s| s.step.order);

        Ok(Some(RecipeDetail {
            recipe,
            ingredients,
            steps,
        }))
    }

    async fn create_recipe(&self, new: NewRecipe) -> PortResult<Recipe> {
        let mut t = self.tables.write().await;

        if !t.users.contains_key(&new.user_id) {
            return Err(PortError::Unexpected(format!(
                "recipes.user_id references unknown user {}",
                new.user_id
            )));
        }
        if let Some(category_id) = new.category_id {
            if !t.categories.iter().any(|c| c.id == category_id) {
                return Err(PortError::Unexpected(format!(
                    "recipes.category_id references unknown category {}",
                    category_id
                )));
            }
        }

        let recipe = Recipe {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            cover_image: new.cover_image,
            cook_time: new.cook_time,
            serving: new.serving,
            origin: new.origin,
            category_id: new.category_id,
            user_id: new.user_id,
            is_published: false,
            created_at: Utc::now(),
            updated_at: None,
        };

        let ingredients: Vec<Ingredient> = new
            .ingredients
            .into_iter()
            .map(|i| Ingredient {
                id: Uuid::new_v4(),
                recipe_id: recipe.id,
                name: i.name,
                order: i.order,
            })
            .collect();

        let mut steps = Vec::with_capacity(new.steps.len());
        let mut step_images = Vec::new();
        for s in new.steps {
            let step = Step {
                id: Uuid::new_v4(),
                recipe_id: recipe.id,
                order: s.order,
                instruction: s.instruction,
            };
            step_images.extend(s.image_urls.into_iter().map(|url| StepImage {
                id: Uuid::new_v4(),
                step_id: step.id,
                image_url: url,
            }));
            steps.push(step);
        }

        t.recipes.push(recipe.clone());
        t.ingredients.extend(ingredients);
        t.steps.extend(steps);
        t.step_images.extend(step_images);
        Ok(recipe)
    }

    async fn delete_recipe(&self, recipe_id: Uuid) -> PortResult<bool> {
        let mut t = self.tables.write().await;
        let before = t.recipes.len();
        t.recipes.retain(|r| r.id != recipe_id);
        if t.recipes.len() == before {
            return Ok(false);
        }

        let step_ids: Vec<Uuid> = t
            .steps
            .iter()
            .filter(|s| s.recipe_id == recipe_id)
            .map(|s| s.id)
            .collect();
        t.step_images.retain(|img| !step_ids.contains(&img.step_id));
        t.steps.retain(|s| s.recipe_id != recipe_id);
        t.ingredients.retain(|i| i.recipe_id != recipe_id);
        Ok(true)
    }
}
