//! # Todo Persistence
//!
//! Loads and saves the todo list. Effects call into a [`TodoStore`] held in
//! the program context, so tests can swap the file for memory.
//!
//! The file store keeps one JSON document. Writes use atomic rename
//! (write `.tmp`, then `rename()`) for crash safety.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::Todo;

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
            StoreError::Serde(e) => write!(f, "store format error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Serde(e) => Some(e),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e)
    }
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Returns the name of the store, for logs.
    fn name(&self) -> &str;

    /// Everything saved so far. An empty list if nothing was ever saved.
    async fn load(&self) -> Result<Vec<Todo>, StoreError>;

    /// Replaces the stored list.
    async fn save(&self, todos: &[Todo]) -> Result<(), StoreError>;
}

/// On-disk layout.
#[derive(Serialize, Deserialize, Debug)]
struct TodoFile {
    saved_at: DateTime<Utc>,
    todos: Vec<Todo>,
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TodoStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Result<Vec<Todo>, StoreError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No todo file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let file: TodoFile = serde_json::from_str(&json)?;
        info!(
            "Loaded {} todos from {} (saved {})",
            file.todos.len(),
            self.path.display(),
            file.saved_at.to_rfc3339()
        );
        Ok(file.todos)
    }

    async fn save(&self, todos: &[Todo]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = TodoFile {
            saved_at: Utc::now(),
            todos: todos.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Saved {} todos to {}", todos.len(), self.path.display());
        Ok(())
    }
}
