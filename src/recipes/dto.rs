use axum::extract::Multipart;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::images::services::ImageUpload;

/// Fields of the recipe create/edit form.
///
/// Missing text fields read as empty strings, matching how HTML form posts
/// behave; the image is optional and its absence is not an error.
#[derive(Debug, Default)]
pub struct RecipeForm {
    pub title: String,
    pub description: String,
    pub time: String,
    pub image: Option<ImageUpload>,
}

impl RecipeForm {
    pub async fn from_multipart(mut mp: Multipart) -> AppResult<Self> {
        let mut form = RecipeForm::default();
        while let Some(field) = mp.next_field().await.map_err(malformed)? {
            let name = field.name().map(|s| s.to_string());
            match name.as_deref() {
                Some("title") => form.title = field.text().await.map_err(malformed)?,
                Some("description") => form.description = field.text().await.map_err(malformed)?,
                Some("time") => form.time = field.text().await.map_err(malformed)?,
                Some("image") => {
                    let file_name = field.file_name().map(|s| s.to_string());
                    let body = field.bytes().await.map_err(malformed)?;
                    // A file input left empty still submits a nameless,
                    // zero-byte part; that counts as no image.
                    if let Some(name) = file_name.filter(|n| !n.is_empty()) {
                        if !body.is_empty() {
                            form.image = Some(ImageUpload {
                                file_name: name,
                                body,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

fn malformed(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(e.to_string())
}

#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: i64,
    pub title: String,
    pub time: String,
    pub image_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub time: String,
    pub image_path: Option<String>,
}
