//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use bite_core::domain::{
    position_order, Category, Ingredient, NewRecipe, Recipe, RecipeDetail, Step, StepImage,
    StepWithImages, User, UserCredentials,
};
use bite_core::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

const RECIPE_COLUMNS: &str = "id, title, description, cover_image, cook_time, serving, origin, \
     category_id, user_id, is_published, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a driver error onto the port taxonomy. Unique violations become `AlreadyExists`.
fn port_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::AlreadyExists(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
    name: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct CategoryRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
}
impl CategoryRecord {
    fn to_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            description: self.description,
        }
    }
}

#[derive(FromRow)]
struct RecipeRecord {
    id: Uuid,
    title: String,
    description: String,
    cover_image: Option<String>,
    cook_time: Option<String>,
    serving: Option<String>,
    origin: Option<String>,
    category_id: Option<Uuid>,
    user_id: Uuid,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}
impl RecipeRecord {
    fn to_domain(self) -> Recipe {
        Recipe {
            id: self.id,
            title: self.title,
            description: self.description,
            cover_image: self.cover_image,
            cook_time: self.cook_time,
            serving: self.serving,
            origin: self.origin,
            category_id: self.category_id,
            user_id: self.user_id,
            is_published: self.is_published,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct IngredientRecord {
    id: Uuid,
    recipe_id: Uuid,
    name: String,
    order: i32,
}
impl IngredientRecord {
    fn to_domain(self) -> Ingredient {
        Ingredient {
            id: self.id,
            recipe_id: self.recipe_id,
            name: self.name,
            order: self.order,
        }
    }
}

#[derive(FromRow)]
struct StepRecord {
    id: Uuid,
    recipe_id: Uuid,
    order: i32,
    instruction: String,
}
impl StepRecord {
    fn to_domain(self) -> Step {
        Step {
            id: self.id,
            recipe_id: self.recipe_id,
            order: self.order,
            instruction: self.instruction,
        }
    }
}

#[derive(FromRow)]
struct StepImageRecord {
    id: Uuid,
    step_id: Uuid,
    image_url: String,
    position: i32,
}
impl StepImageRecord {
    fn to_domain(self) -> StepImage {
        StepImage {
            id: self.id,
            step_id: self.step_id,
            image_url: self.image_url,
        }
    }
}

/// Groups step image rows by step, each group in `position` order.
fn group_step_images(records: Vec<StepImageRecord>) -> HashMap<Uuid, Vec<StepImage>> {
    let mut grouped: HashMap<Uuid, Vec<StepImageRecord>> = HashMap::new();
    for record in records {
        grouped.entry(record.step_id).or_default().push(record);
    }
    grouped
        .into_iter()
        .map(|(step_id, mut records)| {
            records.sort_by_key(|r| r.position);
            (step_id, records.into_iter().map(StepImageRecord::to_domain).collect())
        })
        .collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, name, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email, name",
        )
        .bind(email)
        .bind(name)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;

        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, name FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn list_categories(&self) -> PortResult<Vec<Category>> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, description FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) \
             RETURNING id, name, description",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn list_recent_recipes(&self, limit: i64) -> PortResult<Vec<Recipe>> {
        let records = sqlx::query_as::<_, RecipeRecord>(&format!(
            "SELECT {} FROM recipes ORDER BY created_at DESC, id DESC LIMIT $1",
            RECIPE_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_recipe_detail(&self, recipe_id: Uuid) -> PortResult<Option<RecipeDetail>> {
        let Some(recipe) = sqlx::query_as::<_, RecipeRecord>(&format!(
            "SELECT {} FROM recipes WHERE id = $1",
            RECIPE_COLUMNS
        ))
        .bind(recipe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        else {
            return Ok(None);
        };

        let ingredients = sqlx::query_as::<_, IngredientRecord>(
            r#"SELECT id, recipe_id, name, "order" FROM ingredients
               WHERE recipe_id = $1 ORDER BY "order" ASC, id ASC"#,
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;

        let steps = sqlx::query_as::<_, StepRecord>(
            r#"SELECT id, recipe_id, "order", instruction FROM steps
               WHERE recipe_id = $1 ORDER BY "order" ASC, id ASC"#,
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;

        let step_ids: Vec<Uuid> = steps.iter().map(|s| s.id).collect();
        let images = sqlx::query_as::<_, StepImageRecord>(
            "SELECT id, step_id, image_url, position FROM step_images
             WHERE step_id = ANY($1) ORDER BY step_id, position",
        )
        .bind(&step_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;

        let mut images_by_step = group_step_images(images);

        let steps = steps
            .into_iter()
            .map(|s| StepWithImages {
                images: images_by_step.remove(&s.id).unwrap_or_default(),
                step: s.to_domain(),
            })
            .collect();

        Ok(Some(RecipeDetail {
            recipe: recipe.to_domain(),
            ingredients: ingredients.into_iter().map(|i| i.to_domain()).collect(),
            steps,
        }))
    }

    async fn create_recipe(&self, new: NewRecipe) -> PortResult<Recipe> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        let recipe = sqlx::query_as::<_, RecipeRecord>(&format!(
            "INSERT INTO recipes (title, description, cover_image, cook_time, serving, origin, \
             category_id, user_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            RECIPE_COLUMNS
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.cover_image)
        .bind(&new.cook_time)
        .bind(&new.serving)
        .bind(&new.origin)
        .bind(new.category_id)
        .bind(new.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(port_error)?
        .ok_or_else(|| PortError::Unexpected("recipe insert returned no id".to_string()))?;

        if !new.ingredients.is_empty() {
            let mut builder =
                QueryBuilder::<Postgres>::new(r#"INSERT INTO ingredients (recipe_id, name, "order") "#);
            builder.push_values(&new.ingredients, |mut row, ingredient| {
                row.push_bind(recipe.id)
                    .push_bind(ingredient.name.clone())
                    .push_bind(ingredient.order);
            });
            builder.build().execute(&mut *tx).await.map_err(port_error)?;
        }

        for step in &new.steps {
            let step_id = sqlx::query_scalar::<_, Uuid>(
                r#"INSERT INTO steps (recipe_id, "order", instruction) VALUES ($1, $2, $3) RETURNING id"#,
            )
            .bind(recipe.id)
            .bind(step.order)
            .bind(&step.instruction)
            .fetch_one(&mut *tx)
            .await
            .map_err(port_error)?;

            if !step.image_urls.is_empty() {
                let mut builder = QueryBuilder::<Postgres>::new(
                    "INSERT INTO step_images (step_id, image_url, position) ",
                );
                builder.push_values(
                    step.image_urls.iter().enumerate(),
                    |mut row, (index, url)| {
                        row.push_bind(step_id)
                            .push_bind(url.clone())
                            .push_bind(position_order(index));
                    },
                );
                builder.build().execute(&mut *tx).await.map_err(port_error)?;
            }
        }

        tx.commit().await.map_err(port_error)?;
        Ok(recipe.to_domain())
    }

    async fn delete_recipe(&self, recipe_id: Uuid) -> PortResult<bool> {
        // Ingredients, steps and step images go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(step_id: Uuid, position: i32) -> StepImageRecord {
        StepImageRecord {
            id: Uuid::new_v4(),
            step_id,
            image_url: format!("http://cdn/{}/{}", step_id, position),
            position,
        }
    }

    #[test]
    fn step_images_are_grouped_in_position_order() {
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let rows = vec![
            record(first, 2),
            record(second, 1),
            record(first, 0),
            record(second, 0),
            record(first, 1),
        ];

        let grouped = group_step_images(rows);

        let urls = |step_id: Uuid| -> Vec<String> {
            grouped[&step_id].iter().map(|i| i.image_url.clone()).collect()
        };
        assert_eq!(
            urls(first),
            vec![
                format!("http://cdn/{}/0", first),
                format!("http://cdn/{}/1", first),
                format!("http://cdn/{}/2", first),
            ]
        );
        assert_eq!(
            urls(second),
            vec![
                format!("http://cdn/{}/0", second),
                format!("http://cdn/{}/1", second),
            ]
        );
    }
}
