use std::path::PathBuf;

use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    images::{dto::GeneratedImage, repo_types::ImageRecord},
    provider::GenerationOptions,
    state::AppState,
};

/// A user id or filename is only used as a single path component.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

/// `generated_YYYYMMDD_HHMMSS_xxxxxxxx.png`
pub fn generated_filename(now: OffsetDateTime) -> String {
    let stamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("generated_{}_{}.png", stamp, &suffix[..8])
}

pub fn image_url(user_id: &str, filename: &str) -> String {
    format!("/images/{user_id}/{filename}")
}

pub async fn generate_for_user(
    st: &AppState,
    user_id: &str,
    prompt: &str,
    options: Option<GenerationOptions>,
) -> Result<GeneratedImage, AppError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::validation("Prompt is required"));
    }
    if user_id.is_empty() {
        return Err(AppError::validation("User ID is required"));
    }
    if !is_safe_segment(user_id) {
        return Err(AppError::validation("Invalid user ID"));
    }
    let options = options.unwrap_or_default();
    if let Some(field) = options.first_invalid() {
        return Err(AppError::validation(format!(
            "{field} must be a positive integer"
        )));
    }

    info!(%user_id, "generating image");
    debug!(%prompt, ?options, "generation request");

    let remote_url = st.generator.generate(prompt, &options).await?;

    let now = OffsetDateTime::now_utc();
    let filename = generated_filename(now);
    st.fetcher
        .fetch_and_store(&remote_url, &st.config.user_dir(user_id), &filename)
        .await?;

    let record = ImageRecord {
        id: Uuid::new_v4(),
        filename: filename.clone(),
        prompt: prompt.to_string(),
        timestamp: now,
        options,
        url: image_url(user_id, &filename),
    };
    let response = GeneratedImage {
        id: record.id,
        url: record.url.clone(),
        filename,
    };
    st.images.append(user_id, record).await?;

    info!(%user_id, image_id = %response.id, filename = %response.filename, "image generated");
    Ok(response)
}

/// Resolves the stored file for `user_id/filename`, or `NotFound`.
pub async fn stored_image_path(
    st: &AppState,
    user_id: &str,
    filename: &str,
) -> Result<PathBuf, AppError> {
    if !is_safe_segment(user_id) || !is_safe_segment(filename) {
        return Err(AppError::not_found("Image not found"));
    }
    let path = st.config.user_dir(user_id).join(filename);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(AppError::not_found("Image not found")),
    }
}

/// Removes the image record, then its file. A failed file removal is only logged.
pub async fn delete_image(st: &AppState, image_id: &str) -> Result<(), AppError> {
    let image_id =
        Uuid::parse_str(image_id).map_err(|_| AppError::not_found("Image not found"))?;
    let deleted = st.images.delete(image_id).await?;

    let path = st
        .config
        .user_dir(&deleted.owner)
        .join(&deleted.record.filename);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "backing file already gone");
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "could not delete image file");
        }
    }

    info!(%image_id, owner = %deleted.owner, "image deleted");
    Ok(())
}
