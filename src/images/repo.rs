use std::sync::Arc;

use uuid::Uuid;

use crate::{
    images::repo_types::{DeletedImage, ImageDocument, ImageRecord},
    storage::{DocumentStore, JsonDocument, RepoError, StoreError},
};

/// Per-user image lists. Order is kept as inserted; sorting happens on read.
pub struct ImageStore {
    doc: JsonDocument<ImageDocument>,
}

impl ImageStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            doc: JsonDocument::new(store),
        }
    }

    /// All images of a user, newest first. Unknown users have no images.
    pub async fn list(&self, user_id: &str) -> Result<Vec<ImageRecord>, StoreError> {
        let mut images = self.doc.load().await?.remove(user_id).unwrap_or_default();
        images.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(images)
    }

    pub async fn append(&self, user_id: &str, record: ImageRecord) -> Result<(), StoreError> {
        self.doc
            .update(|doc| {
                doc.entry(user_id.to_string()).or_default().push(record);
                Ok::<_, StoreError>(())
            })
            .await
    }

    /// Removes the first image with `image_id` across all users.
    pub async fn delete(&self, image_id: Uuid) -> Result<DeletedImage, RepoError> {
        self.doc
            .update(|doc| {
                for (owner, images) in doc.iter_mut() {
                    if let Some(pos) = images.iter().position(|img| img.id == image_id) {
                        let record = images.remove(pos);
                        return Ok(DeletedImage {
                            owner: owner.clone(),
                            record,
                        });
                    }
                }
                Err(RepoError::Missing {
                    entity: "Image",
                    id: image_id.to_string(),
                })
            })
            .await
    }
}
