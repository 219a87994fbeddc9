// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::{Thread, ThreadStore};
use crate::adk::error::{Result, TollgateError};

/// Thread store keeping one pretty-printed JSON file per thread
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn thread_path(&self, thread_id: &str) -> Result<PathBuf> {
        validate_thread_id(thread_id)?;
        Ok(self.base_path.join(format!("{}.json", thread_id)))
    }
}

/// Reject ids that are unsafe as file names
fn validate_thread_id(thread_id: &str) -> Result<()> {
    if thread_id.is_empty() {
        return Err(TollgateError::store("thread id cannot be empty"));
    }
    if thread_id.contains('/')
        || thread_id.contains('\\')
        || thread_id.contains("..")
        || thread_id.starts_with('.')
        || thread_id.chars().any(|c| c.is_control())
    {
        return Err(TollgateError::store(format!(
            "thread id contains invalid characters: {:?}",
            thread_id
        )));
    }
    Ok(())
}

#[async_trait]
impl ThreadStore for FileStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Thread>> {
        let path = self.thread_path(thread_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, thread: &Thread) -> Result<()> {
        let path = self.thread_path(&thread.id)?;
        tokio::fs::create_dir_all(&self.base_path).await?;
        let content = serde_json::to_string_pretty(thread)?;

        let tmp_path = self.base_path.join(format!(
            ".{}.{}.tmp",
            thread.id,
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        log::debug!("Persisted thread {} at step {}", thread.id, thread.step);
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let path = self.thread_path(thread_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                    if !id.starts_with('.') {
                        ids.push(id.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tollgate::workflow::interrupt::InterruptRecord;
    use crate::tollgate::workflow::state::{StateDelta, StateSchema, StateSnapshot};
    use crate::tollgate::workflow::store::ThreadStatus;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_keeps_pending_interrupts() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let mut snapshot = StateSnapshot::empty();
        snapshot
            .apply(
                &StateDelta::new().set("question", json!("add 2 and 3")),
                &StateSchema::default(),
            )
            .unwrap();
        let mut thread = Thread::new("thread-1", snapshot, Some("tools".into()));
        thread.status = ThreadStatus::Interrupted;
        thread.pending.push_back(InterruptRecord {
            id: "tools:1:0".into(),
            node: "tools".into(),
            key: "call_1".into(),
            payload: json!({"action": "add", "args": {"a": 2, "b": 3}}),
            created_at: Utc::now(),
        });
        store.put(&thread).await.unwrap();

        // A second store over the same directory sees the same thread
        let reopened = FileStore::new(dir.path());
        let loaded = reopened.get("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded, thread);
    }

    #[tokio::test]
    async fn test_missing_thread_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("not-created-yet"));
        assert!(store.get("nobody").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.delete("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        for id in ["thread-b", "thread-a", "thread-c"] {
            store
                .put(&Thread::new(id, StateSnapshot::empty(), None))
                .await
                .unwrap();
        }

        assert_eq!(
            store.list().await.unwrap(),
            vec!["thread-a", "thread-b", "thread-c"]
        );
        assert!(store.delete("thread-b").await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec!["thread-a", "thread-c"]);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        for id in ["", "../escape", "a/b", "a\\b", ".hidden", "bad\nid"] {
            let err = store.get(id).await.unwrap_err();
            assert!(matches!(err, TollgateError::Store(_)), "id {:?}", id);
        }
    }
}
