//! Persisted run state: dedup seen-sets and the rotation cursor.
//!
//! # Files
//!
//! ```text
//! state_dir/
//! ├── posted_articles.json          # global seen-set
//! ├── posted_topic_<slug>.json      # one seen-set per topic
//! └── rotation_state.json           # {"next_index": N}
//! ```
//!
//! Seen-sets are pretty-printed, sorted JSON arrays of links.
//!
//! # Semantics
//!
//! - Loading never fails: a missing file is an empty set / index 0, and an
//!   unreadable or corrupt file is logged and treated the same way.
//! - Saving writes a sibling temp file, syncs it, renames it over the
//!   target and syncs the directory, so a reader sees either the old or the
//!   new content and a completed save survives a crash.
//! - Nothing here takes a lock. At most one run may touch a state
//!   directory at a time.

use crate::utils::slugify;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

const GLOBAL_FILE: &str = "posted_articles.json";
const ROTATION_FILE: &str = "rotation_state.json";
/// Per-topic files carry their own prefix so no topic name can map onto
/// [`GLOBAL_FILE`] or [`ROTATION_FILE`].
const TOPIC_PREFIX: &str = "posted_topic_";

/// Which seen-set a link belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    /// A topic, by name.
    Topic(String),
}

/// Links already posted in one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SeenSet(BTreeSet<String>);

impl SeenSet {
    pub fn contains(&self, link: &str) -> bool {
        self.0.contains(link)
    }

    /// Returns `false` if the link was already present.
    pub fn insert(&mut self, link: &str) -> bool {
        self.0.insert(link.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rotation cursor file contents.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
struct RotationState {
    next_index: usize,
}

/// Index of the topic to try first, always in `[0, topic_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCursor {
    index: usize,
    topic_count: usize,
}

impl RotationCursor {
    /// A cursor at `index`, reduced modulo `topic_count`.
    ///
    /// `topic_count` must be non-zero; config validation guarantees it.
    pub fn new(index: usize, topic_count: usize) -> Self {
        let topic_count = topic_count.max(1);
        Self {
            index: index % topic_count,
            topic_count,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Topic indexes in the order one run tries them: every topic once,
    /// starting at the cursor and wrapping.
    pub fn attempt_order(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.topic_count).map(move |offset| (self.index + offset) % self.topic_count)
    }

    /// Move past the topic that just published successfully.
    pub fn advance(&mut self, successful_topic_index: usize) {
        self.index = (successful_topic_index + 1) % self.topic_count;
    }
}

/// File-backed store for seen-sets and the rotation cursor.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Backing file for a scope.
    pub fn scope_path(&self, scope: &Scope) -> PathBuf {
        match scope {
            Scope::Global => self.dir.join(GLOBAL_FILE),
            Scope::Topic(name) => self.dir.join(format!("{TOPIC_PREFIX}{}.json", slugify(name))),
        }
    }

    pub fn rotation_path(&self) -> PathBuf {
        self.dir.join(ROTATION_FILE)
    }

    /// Load the seen-set of `scope`, degrading to empty on any problem.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_seen(&self, scope: &Scope) -> SeenSet {
        let path = self.scope_path(scope);
        match read_json::<SeenSet>(&path).await {
            Ok(Some(set)) => {
                debug!(path = %path.display(), links = set.len(), "Loaded seen-set");
                set
            }
            Ok(None) => {
                debug!(path = %path.display(), "No seen-set yet; starting empty");
                SeenSet::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable seen-set; starting empty");
                SeenSet::default()
            }
        }
    }

    /// Atomically replace the seen-set of `scope`.
    #[instrument(level = "debug", skip(self, set), fields(links = set.len()))]
    pub async fn persist_seen(&self, scope: &Scope, set: &SeenSet) -> io::Result<()> {
        write_json_atomic(&self.scope_path(scope), set).await
    }

    /// Whether `link` is recorded in `scope`.
    #[cfg(test)]
    pub async fn contains(&self, scope: &Scope, link: &str) -> bool {
        self.load_seen(scope).await.contains(link)
    }

    /// Record `link` in `scope` and persist immediately.
    #[cfg(test)]
    pub async fn add(&self, scope: &Scope, link: &str) -> io::Result<()> {
        let mut set = self.load_seen(scope).await;
        if set.insert(link) {
            self.persist_seen(scope, &set).await?;
        }
        Ok(())
    }

    /// Load the rotation cursor for `topic_count` topics, defaulting to 0.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_cursor(&self, topic_count: usize) -> RotationCursor {
        let path = self.rotation_path();
        let index = match read_json::<RotationState>(&path).await {
            Ok(Some(state)) => state.next_index,
            Ok(None) => 0,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Unreadable rotation state; starting at 0"
                );
                0
            }
        };
        let cursor = RotationCursor::new(index, topic_count);
        debug!(index = cursor.index(), topic_count, "Loaded rotation cursor");
        cursor
    }

    /// Atomically replace the rotation cursor.
    pub async fn persist_cursor(&self, cursor: &RotationCursor) -> io::Result<()> {
        let state = RotationState {
            next_index: cursor.index(),
        };
        write_json_atomic(&self.rotation_path(), &state).await?;
        info!(next_index = cursor.index(), "Saved rotation cursor");
        Ok(())
    }
}

/// Read and parse a JSON file. `Ok(None)` when the file does not exist.
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write `value` as pretty JSON via temp file + fsync + rename + directory fsync.
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "state path has no file name"))?;
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(&json).await?;
    file.write_all(b"\n").await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    sync_parent_dir(path).await?;
    debug!(path = %path.display(), bytes = json.len(), "Wrote state file");
    Ok(())
}

/// Flush the directory entry of `path` so a finished rename is durable.
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::File::open(parent).await?.sync_all().await
}

// Directories cannot be opened for syncing here; the rename is all we get.
#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
