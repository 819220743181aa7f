use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::GenerationOptions;

/// POST /generate-image body.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateImageRequest {
    pub prompt: String,
    pub user_id: String,
    pub options: Option<GenerationOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
