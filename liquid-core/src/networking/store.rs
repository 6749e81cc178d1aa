//! Durable, token-keyed storage for pending events
//!
//! Each token owns one JSON file named after a SHA-256 digest of the token,
//! so arbitrary token strings are safe as file names and several tokens can
//! coexist in the same directory. Writes go to a temporary file that is then
//! renamed over the previous blob.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::Result;

use super::event::Event;

const BLOB_VERSION: u32 = 1;

/// On-disk layout of a persisted queue
#[derive(Debug, Serialize, Deserialize)]
struct QueueBlob {
    version: u32,
    archived_at: DateTime<Utc>,
    events: Vec<Event>,
}

/// Borrowing twin of [`QueueBlob`] so archiving does not clone the events
#[derive(Serialize)]
struct QueueBlobRef<'a> {
    version: u32,
    archived_at: DateTime<Utc>,
    events: &'a [Event],
}

/// Directory of persisted queues, one per token
#[derive(Debug, Clone)]
pub struct QueueStore {
    dir: PathBuf,
}

impl QueueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `$XDG_DATA_HOME/liquid/queues`
    pub fn default_location() -> Self {
        Self::new(Config::queue_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the blob belonging to `token`
    pub fn path_for(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{}.json", token_digest(token)))
    }

    /// Persist `events` for `token`, replacing any previous blob
    pub fn archive(&self, token: &str, events: &[Event]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let blob = QueueBlobRef {
            version: BLOB_VERSION,
            archived_at: Utc::now(),
            events,
        };
        let bytes = serde_json::to_vec(&blob)?;

        let path = self.path_for(token);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(
            path = %path.display(),
            events = events.len(),
            "Archived event queue"
        );
        Ok(())
    }

    /// Load the events persisted for `token`
    ///
    /// A missing, unreadable or corrupt blob yields an empty list.
    pub fn unarchive(&self, token: &str) -> Vec<Event> {
        let path = self.path_for(token);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read queue blob");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<QueueBlob>(&bytes) {
            Ok(blob) if blob.version == BLOB_VERSION => {
                tracing::debug!(
                    path = %path.display(),
                    events = blob.events.len(),
                    archived_at = %blob.archived_at,
                    "Unarchived event queue"
                );
                blob.events
            }
            Ok(blob) => {
                tracing::warn!(
                    path = %path.display(),
                    version = blob.version,
                    "Ignoring queue blob with unknown version"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt queue blob");
                Vec::new()
            }
        }
    }

    /// Remove the blob for `token`; succeeds if there is none
    pub fn delete(&self, token: &str) -> Result<()> {
        let path = self.path_for(token);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted event queue");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, token: &str) -> bool {
        self.path_for(token).is_file()
    }
}

/// First 32 hex chars of SHA-256(token)
fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..16])
}
