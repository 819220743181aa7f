use std::path::Path;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::PublicUser,
        password::{hash_password, verify_password},
        repo_types::User,
    },
    error::AppError,
    state::AppState,
    storage::RepoError,
};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Idempotently creates the per-user image directory.
pub async fn ensure_user_dir(images_dir: &Path, user_id: Uuid) -> anyhow::Result<()> {
    let dir = images_dir.join(user_id.to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("create user directory {}", dir.display()))?;
    debug!(path = %dir.display(), "user directory ready");
    Ok(())
}

pub async fn create_user(
    st: &AppState,
    email: &str,
    name: &str,
    password: &str,
) -> Result<PublicUser, AppError> {
    let email = normalize_email(email);
    let name = name.trim();

    if email.is_empty() || password.is_empty() || name.is_empty() {
        return Err(AppError::validation("All fields are required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let password_hash = hash_password(password)?;
    let user = st
        .users
        .insert(User {
            id: Uuid::new_v4(),
            email,
            name: name.to_string(),
            password_hash,
            created_at: OffsetDateTime::now_utc(),
        })
        .await
        .inspect_err(|e| {
            if matches!(e, RepoError::Duplicate { .. }) {
                warn!("signup for already registered email");
            }
        })?;

    ensure_user_dir(&st.config.images_dir, user.id).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

pub async fn authenticate(
    st: &AppState,
    email: &str,
    password: &str,
) -> Result<PublicUser, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!("login for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    ensure_user_dir(&st.config.images_dir, user.id).await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(user.into())
}
