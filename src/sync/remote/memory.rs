use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{RemoteContent, RemoteError, RemoteFile, Result};

#[derive(Debug, Default)]
struct State {
    files: HashMap<String, RemoteFile>,
    revision: u64,
    reads: usize,
    writes: Vec<String>,
    unavailable: HashSet<String>,
}

/// Process-local versioned store with the same tag semantics as the content API.
///
/// Used for offline runs and tests; it also counts reads and records the paths
/// of writes so callers can assert on network traffic.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<State>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document as if another device had written it
    pub fn seed(&self, path: &str, content: &[u8]) -> String {
        let mut state = self.lock();
        store(&mut state, path, content)
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).map(|f| f.content.clone())
    }

    pub fn version(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).map(|f| f.version.clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().files.contains_key(path)
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Paths written through [`RemoteContent::put`], oldest first
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    /// Make every request for `path` fail with a transport error
    pub fn set_unavailable(&self, path: &str, unavailable: bool) {
        let mut state = self.lock();
        if unavailable {
            state.unavailable.insert(path.to_string());
        } else {
            state.unavailable.remove(path);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn store(state: &mut State, path: &str, content: &[u8]) -> String {
    state.revision += 1;
    let mut hasher = Sha256::new();
    hasher.update(state.revision.to_be_bytes());
    hasher.update(path.as_bytes());
    hasher.update(content);
    let version = hex::encode(hasher.finalize());

    state.files.insert(
        path.to_string(),
        RemoteFile {
            content: content.to_vec(),
            version: version.clone(),
        },
    );
    version
}

#[async_trait]
impl RemoteContent for InMemoryRemote {
    async fn get(&self, path: &str) -> Result<RemoteFile> {
        let mut state = self.lock();
        if state.unavailable.contains(path) {
            return Err(RemoteError::Transport(format!("{} is unavailable", path)));
        }
        state.reads += 1;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        version: Option<&str>,
        _message: &str,
    ) -> Result<String> {
        let mut state = self.lock();
        if state.unavailable.contains(path) {
            return Err(RemoteError::Transport(format!("{} is unavailable", path)));
        }

        let current = state.files.get(path).map(|f| f.version.as_str());
        match (version, current) {
            // Unguarded writes to an existing document are rejected like the
            // contents API does when `sha` is missing
            (None, Some(_)) => return Err(RemoteError::Conflict(path.to_string())),
            (Some(expected), Some(current)) if expected != current => {
                return Err(RemoteError::Conflict(path.to_string()))
            }
            (Some(_), None) => return Err(RemoteError::Conflict(path.to_string())),
            _ => {}
        }

        state.writes.push(path.to_string());
        Ok(store(&mut state, path, content))
    }
}
