use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    images::services::store_recipe_image,
    state::AppState,
};

use super::dto::{RecipeDetails, RecipeForm, RecipeListItem};
use super::repo::Recipe;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list))
        .route("/recipes/new", get(new_form))
        .route("/recipes/:id", get(show))
        .route("/recipes/:id/edit", get(edit_form))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/new", post(create))
        .route("/recipes/:id/edit", post(update))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<RecipeListItem>>> {
    let recipes = Recipe::list_by_owner(&state.db, user_id).await?;
    let items = recipes
        .into_iter()
        .map(|r| RecipeListItem {
            id: r.id,
            title: r.title,
            time: r.time,
            image_path: r.image_path,
        })
        .collect();
    Ok(Json(items))
}

/// Single-recipe reads are public: the id alone is enough, whoever asks.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<RecipeDetails>> {
    let recipe = Recipe::get(&state.db, id).await?;
    Ok(Json(details(recipe)))
}

/// The creation form is rendered by the frontend; this route only enforces
/// the login requirement.
pub async fn new_form(AuthUser(_user_id): AuthUser) -> StatusCode {
    StatusCode::OK
}

#[instrument(skip(state, mp))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> AppResult<Redirect> {
    let form = RecipeForm::from_multipart(mp).await?;

    // Insert first to obtain the id the stored image name is derived from.
    // If the attach step fails the row stays behind without its image; no
    // compensating delete is attempted.
    let recipe = Recipe::create(
        &state.db,
        user_id,
        &form.title,
        &form.description,
        &form.time,
    )
    .await?;

    if let Some(upload) = form.image {
        let path = store_recipe_image(&state, recipe.id, upload).await?;
        Recipe::attach_image(&state.db, recipe.id, &path).await?;
    }

    info!(user_id = %user_id, recipe_id = %recipe.id, "recipe created");
    Ok(Redirect::to(&format!("/recipes/{}", recipe.id)))
}

/// Prefill data for the edit form. Ownership of the id is not checked
/// against the caller; any logged-in user can load and edit any recipe.
#[instrument(skip(state, _user_id))]
pub async fn edit_form(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<RecipeDetails>> {
    let recipe = Recipe::get(&state.db, id).await?;
    Ok(Json(details(recipe)))
}

#[instrument(skip(state, mp))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    mp: Multipart,
) -> AppResult<Redirect> {
    let form = RecipeForm::from_multipart(mp).await?;

    let image_path = match form.image {
        Some(upload) => Some(store_recipe_image(&state, id, upload).await?),
        None => None,
    };

    Recipe::update(
        &state.db,
        id,
        &form.title,
        &form.description,
        &form.time,
        image_path.as_deref(),
    )
    .await?;

    info!(user_id = %user_id, recipe_id = %id, "recipe updated");
    Ok(Redirect::to(&format!("/recipes/{}", id)))
}

fn details(recipe: Recipe) -> RecipeDetails {
    RecipeDetails {
        id: recipe.id,
        title: recipe.title,
        description: recipe.description,
        time: recipe.time,
        image_path: recipe.image_path,
    }
}
