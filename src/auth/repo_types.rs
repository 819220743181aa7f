use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record as persisted in the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,                   // assigned on signup, never changes
    pub email: String,              // normalized: trimmed and lowercased
    pub name: String,
    pub password_hash: String,      // Argon2 PHC string, never returned to clients
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Normalized email → user.
pub type UserDocument = BTreeMap<String, User>;
