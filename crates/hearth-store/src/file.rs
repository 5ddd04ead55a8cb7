//! Atomic-file snapshot backend
//!
//! Serialize to a sibling tmp file, then rename over the canonical path.
//! Rename is atomic on the filesystems we care about, so a reader sees
//! either the old snapshot or the new one — never a half-written payload.

use std::path::PathBuf;

use hearth_core::{Error, Result, Snapshot};
use tracing::warn;

use crate::SnapshotBackend;

pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn tmp_path(&self) -> PathBuf {
        // Process id in the tmp name keeps a crashed writer's leftovers
        // from colliding with a live one.
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push_str(&format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for FileBackend {
    async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::store_write(format!("mkdir: {e}")))?;
        }
        let json = serde_json::to_vec(snapshot)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| Error::store_write(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::store_write(format!("rename: {e}")))?;
        Ok(())
    }

    async fn read(&self) -> Result<Option<Snapshot>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::store_read(e.to_string())),
        };
        match serde_json::from_slice::<Snapshot>(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                // Unparseable means absent, not an error to the caller.
                warn!(path = %self.path.display(), "discarding unparseable snapshot: {e}");
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::store_write(format!("clear: {e}"))),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
