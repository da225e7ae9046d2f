//! Key/value persistence for dismissals, markers and migration flags
//!
//! Values live either in a per-user scope or in a single global scope.
//! [`JsonFileStore`] keeps one JSON object per scope on disk and serializes
//! writers with an exclusive file lock; [`MemoryStore`] backs tests and
//! dry runs.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Storage scope for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope<'a> {
    Global,
    User(&'a str),
}

impl Scope<'_> {
    fn key(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::User(id) => format!("user:{}", id),
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, scope: Scope<'_>, key: &str) -> Result<Option<Value>>;

    fn set(&self, scope: Scope<'_>, key: &str, value: Value) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn delete(&self, scope: Scope<'_>, key: &str) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), Value>>> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, scope: Scope<'_>, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(&(scope.key(), key.to_string())).cloned())
    }

    fn set(&self, scope: Scope<'_>, key: &str, value: Value) -> Result<()> {
        self.lock()?.insert((scope.key(), key.to_string()), value);
        Ok(())
    }

    fn delete(&self, scope: Scope<'_>, key: &str) -> Result<()> {
        self.lock()?.remove(&(scope.key(), key.to_string()));
        Ok(())
    }
}

/// File-backed store rooted at the state directory
///
/// Layout:
/// - `<root>/options.json` for the global scope
/// - `<root>/users/<id>.json` for each user scope
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scope_path(&self, scope: Scope<'_>) -> PathBuf {
        match scope {
            Scope::Global => self.root.join("options.json"),
            Scope::User(id) => self
                .root
                .join("users")
                .join(format!("{}.json", user_file_stem(id))),
        }
    }

    fn read_scope(&self, scope: Scope<'_>) -> Result<Map<String, Value>> {
        let path = self.scope_path(scope);
        if !path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        parse_scope(&content, &path)
    }

    /// Atomically replace one key's value with `f(current)`
    pub fn update<F>(&self, scope: Scope<'_>, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        self.update_scope(scope, |map| {
            let next = f(map.remove(key));
            map.insert(key.to_string(), next);
        })
    }

    /// Read-modify-write one scope file under an exclusive lock
    fn update_scope<F>(&self, scope: Scope<'_>, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let path = self.scope_path(scope);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open state file {}", path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire exclusive lock on state file")?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read state file")?;
        let mut map = parse_scope(&content, &path)?;

        mutate(&mut map);

        let json = serde_json::to_string_pretty(&Value::Object(map))
            .context("Failed to serialize state")?;
        file.set_len(0).context("Failed to truncate state file")?;
        file.seek(SeekFrom::Start(0))
            .context("Failed to rewind state file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write state file")?;
        file.sync_all().context("Failed to sync state file")?;

        debug!("Updated state file {}", path.display());
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, scope: Scope<'_>, key: &str) -> Result<Option<Value>> {
        Ok(self.read_scope(scope)?.remove(key))
    }

    fn set(&self, scope: Scope<'_>, key: &str, value: Value) -> Result<()> {
        self.update_scope(scope, |map| {
            map.insert(key.to_string(), value);
        })
    }

    fn delete(&self, scope: Scope<'_>, key: &str) -> Result<()> {
        if !self.scope_path(scope).exists() {
            return Ok(());
        }
        self.update_scope(scope, |map| {
            map.remove(key);
        })
    }
}

fn parse_scope(content: &str, path: &Path) -> Result<Map<String, Value>> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(content)
        .with_context(|| format!("Corrupt state file {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// File stem for a user id
///
/// Ids made of safe characters that do not start with a dot are used as-is.
/// Anything else is written as `~` plus the hex of its bytes, so distinct ids
/// never share a file and no id escapes the users directory.
fn user_file_stem(id: &str) -> String {
    let plain = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '@' | '.'));
    if plain && !id.is_empty() && !id.starts_with('.') {
        id.to_string()
    } else {
        format!("~{}", hex::encode(id.as_bytes()))
    }
}
