use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Whole-document persistence. Implementations replace the stored bytes in one step.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self) -> Result<Option<Bytes>, StoreError>;
    async fn write(&self, body: Bytes) -> Result<(), StoreError>;

    /// Where the document lives, for log lines.
    fn location(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outcome of a keyed lookup or insert in one of the record stores.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{entity} {key} already exists")]
    Duplicate { entity: &'static str, key: String },

    #[error("{entity} {id} not found")]
    Missing { entity: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A JSON document kept in a single file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn read(&self) -> Result<Option<Bytes>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(body) => Ok(Some(Bytes::from(body))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn write(&self, body: Bytes) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Full replace: temp file, then rename over the target.
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &body).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_err)?;
        debug!(path = %self.path.display(), bytes = body.len(), "document written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory document, for tests and throwaway instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    body: std::sync::Mutex<Option<Bytes>>,
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self) -> Result<Option<Bytes>, StoreError> {
        Ok(self.body.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn write(&self, body: Bytes) -> Result<(), StoreError> {
        *self.body.lock().unwrap_or_else(|e| e.into_inner()) = Some(body);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}

/// Typed view over a [`DocumentStore`].
///
/// Every mutation is a full read-modify-write cycle. The mutex serializes those cycles
/// within this process so concurrent requests cannot overwrite each other's updates.
pub struct JsonDocument<T> {
    store: Arc<dyn DocumentStore>,
    lock: Mutex<()>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
            _doc: PhantomData,
        }
    }

    pub async fn load(&self) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Runs `f` against the current document and persists the result only if `f` succeeds.
    pub async fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_unlocked().await?;
        let out = f(&mut doc)?;
        let body = serde_json::to_vec_pretty(&doc).map_err(StoreError::from)?;
        self.store.write(Bytes::from(body)).await?;
        Ok(out)
    }

    async fn read_unlocked(&self) -> Result<T, StoreError> {
        let Some(body) = self.store.read().await? else {
            return Ok(T::default());
        };
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        match serde_json::from_slice(&body) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                error!(
                    error = %e,
                    location = %self.store.location(),
                    "unreadable document, starting from empty; next write replaces it"
                );
                Ok(T::default())
            }
        }
    }
}
