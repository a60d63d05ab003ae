//! Optional snapshot persistence. Durable storage is a collaborator, not
//! something the scheduler owns, so a minimal store is carried here but
//! never wired into [`crate::scheduler`]. Callers poll
//! `RunHandle::get_snapshot` or subscribe to `events` and persist on their
//! own schedule.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::snapshot::Snapshot;

/// Where to put (and later find) a run's snapshot.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<Snapshot>>;
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON-file snapshot storage, one snapshot per file.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::NodeData;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use topology_types::{NodeKind, NodeName, RunStatus};

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshot.json"));

        assert!(store.load().unwrap().is_none());

        let mut data = BTreeMap::new();
        data.insert(NodeName::from("a"), NodeData::pending(vec![], NodeKind::Work));
        let snapshot = Snapshot {
            status: RunStatus::Running,
            started: Utc::now(),
            finished: None,
            data,
        };

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.data.len(), 1);
    }
}
