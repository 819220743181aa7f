use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub images_dir: PathBuf,
    pub users_file: PathBuf,
    pub user_images_file: PathBuf,
    pub fetch_timeout_secs: u64,
    pub provider: ProviderConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let provider = ProviderConfig {
            base_url: env_or("PROVIDER_BASE_URL", "https://api.studio.nebius.com/v1/"),
            api_key: std::env::var("PROVIDER_API_KEY").context("PROVIDER_API_KEY must be set")?,
            model: env_or("PROVIDER_MODEL", "stability-ai/sdxl"),
            timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS", 600),
        };
        Ok(Self {
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_parse("APP_PORT", 5000),
            images_dir: env_or("IMAGES_DIR", "generated_images").into(),
            users_file: env_or("USERS_FILE", "users.json").into(),
            user_images_file: env_or("USER_IMAGES_FILE", "user_images.json").into(),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 30),
            provider,
        })
    }

    /// Directory holding one user's generated files.
    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.images_dir.join(user_id)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("IMAGEGEN_TEST_PORT_GARBAGE", "not-a-port");
        assert_eq!(env_parse::<u16>("IMAGEGEN_TEST_PORT_GARBAGE", 5000), 5000);
        std::env::set_var("IMAGEGEN_TEST_PORT_OK", "8081");
        assert_eq!(env_parse::<u16>("IMAGEGEN_TEST_PORT_OK", 5000), 8081);
    }

    #[test]
    fn env_or_uses_default_when_unset() {
        assert_eq!(env_or("IMAGEGEN_TEST_UNSET_VAR", "fallback"), "fallback");
    }
}
