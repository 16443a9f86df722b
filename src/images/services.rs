use anyhow::Context;
use bytes::Bytes;

use crate::state::AppState;

/// One file lifted out of a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub body: Bytes,
}

/// Persists an uploaded image for `recipe_id` and returns the public path
/// to store in `recipes.image_path`.
///
/// The stored name is `{recipe_id}_{original name}`. Two concurrent uploads
/// for the same recipe and file name therefore write the same file; last
/// writer wins.
pub async fn store_recipe_image(
    state: &AppState,
    recipe_id: i64,
    upload: ImageUpload,
) -> anyhow::Result<String> {
    let name = stored_image_name(recipe_id, &upload.file_name);
    state
        .images
        .put_image(&name, upload.body)
        .await
        .with_context(|| format!("store image {}", name))?;
    Ok(state.images.public_path(&name))
}

/// Derives the on-disk name from the recipe id and the client-supplied file
/// name, reduced to its final path component so it cannot escape the upload
/// directory.
fn stored_image_name(recipe_id: i64, original: &str) -> String {
    let base = std::path::Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    format!("{}_{}", recipe_id, base)
}
