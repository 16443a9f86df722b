use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub time: String,
    pub image_path: Option<String>,
    pub user_id: i64,
}

impl Recipe {
    /// Insert a new recipe owned by `owner_id`. The image, if any, is
    /// attached afterwards once the assigned id is known.
    pub async fn create(
        db: &PgPool,
        owner_id: i64,
        title: &str,
        description: &str,
        time: &str,
    ) -> AppResult<Recipe> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (title, description, time, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, time, image_path, user_id
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(time)
        .bind(owner_id)
        .fetch_one(db)
        .await?;
        Ok(recipe)
    }

    /// All recipes owned by `owner_id`, ascending by id.
    pub async fn list_by_owner(db: &PgPool, owner_id: i64) -> AppResult<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, title, description, time, image_path, user_id
            FROM recipes
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Fetch a recipe by id. Reads are not owner-scoped: any caller may
    /// fetch any recipe.
    pub async fn get(db: &PgPool, id: i64) -> AppResult<Recipe> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, title, description, time, image_path, user_id
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        recipe.ok_or(AppError::NotFound)
    }

    /// Record the stored image path on an already-inserted recipe.
    pub async fn attach_image(db: &PgPool, id: i64, image_path: &str) -> AppResult<()> {
        sqlx::query(r#"UPDATE recipes SET image_path = $1 WHERE id = $2"#)
            .bind(image_path)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Overwrite the mutable fields. `image_path` of `None` leaves the
    /// stored value untouched; `Some` replaces it.
    pub async fn update(
        db: &PgPool,
        id: i64,
        title: &str,
        description: &str,
        time: &str,
        image_path: Option<&str>,
    ) -> AppResult<()> {
        let result = match image_path {
            Some(path) => {
                sqlx::query(
                    r#"
                    UPDATE recipes
                       SET title = $1, description = $2, time = $3, image_path = $4
                     WHERE id = $5
                    "#,
                )
                .bind(title)
                .bind(description)
                .bind(time)
                .bind(path)
                .bind(id)
                .execute(db)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE recipes
                       SET title = $1, description = $2, time = $3
                     WHERE id = $4
                    "#,
                )
                .bind(title)
                .bind(description)
                .bind(time)
                .bind(id)
                .execute(db)
                .await?
            }
        };
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
