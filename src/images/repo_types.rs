use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::provider::GenerationOptions;

/// Metadata for one generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub filename: String,
    pub prompt: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub options: GenerationOptions,
    pub url: String, // served path, `/images/{user_id}/{filename}`
}

/// User id → images in insertion order.
pub type ImageDocument = BTreeMap<String, Vec<ImageRecord>>;

/// A record removed from the store, with the user whose directory holds its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedImage {
    pub owner: String,
    pub record: ImageRecord,
}
