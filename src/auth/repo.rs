use std::sync::Arc;

use crate::{
    auth::repo_types::{User, UserDocument},
    storage::{DocumentStore, JsonDocument, RepoError, StoreError},
};

/// Credential store keyed by normalized email.
pub struct UserStore {
    doc: JsonDocument<UserDocument>,
}

impl UserStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            doc: JsonDocument::new(store),
        }
    }

    /// Find a user by normalized email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.doc.load().await?.remove(email))
    }

    /// Insert a new user, failing if the email is already registered.
    pub async fn insert(&self, user: User) -> Result<User, RepoError> {
        self.doc
            .update(|users| {
                if users.contains_key(&user.email) {
                    return Err(RepoError::Duplicate {
                        entity: "User",
                        key: user.email.clone(),
                    });
                }
                users.insert(user.email.clone(), user.clone());
                Ok(user)
            })
            .await
    }
}
