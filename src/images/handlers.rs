use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::AppError,
    images::{
        dto::{GenerateImageRequest, GeneratedImage, MessageResponse},
        repo_types::ImageRecord,
        services,
    },
    state::AppState,
};

pub fn image_routes() -> Router<AppState> {
    // `:id` is the user id when followed by a filename, otherwise the image id.
    Router::new()
        .route("/generate-image", post(generate_image))
        .route("/images/:id/:filename", get(serve_image))
        .route("/images/:id", delete(delete_image))
        .route("/user/:id/images", get(list_user_images))
}

#[instrument(skip(state, payload))]
pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<GeneratedImage>, AppError> {
    let Json(req) = payload?;
    let image =
        services::generate_for_user(&state, &req.user_id, &req.prompt, req.options).await?;
    Ok(Json(image))
}

#[instrument(skip(state))]
pub async fn serve_image(
    State(state): State<AppState>,
    Path((user_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let path = services::stored_image_path(&state, &user_id, &filename).await?;
    let body = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::not_found("Image not found"))?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], body))
}

#[instrument(skip(state))]
pub async fn list_user_images(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    Ok(Json(state.images.list(&user_id).await?))
}

#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_image(&state, &image_id).await?;
    Ok(Json(MessageResponse {
        message: "Image deleted successfully",
    }))
}
