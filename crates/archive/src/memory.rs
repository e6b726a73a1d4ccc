use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use vigil_core::CheckResult;

use crate::error::ArchiveError;
use crate::snapshot::CheckSnapshot;
use crate::traits::ResultArchive;

/// In-memory blob archive. Objects are stored as serialized JSON under
/// the same key scheme a blob-store backend would use.
#[derive(Default)]
pub struct MemoryArchive {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

fn result_key(check_id: &str, bastion_id: &str) -> String {
    format!("latest/{check_id}/{bastion_id}")
}

fn snapshot_key(transition_id: i64, check_id: &str) -> String {
    format!("transitions/{transition_id}/{check_id}")
}

impl MemoryArchive {
    pub fn new() -> MemoryArchive {
        MemoryArchive::default()
    }

    fn put(&self, key: String, body: Vec<u8>) -> Result<(), ArchiveError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| ArchiveError::Backend("memory archive mutex poisoned".to_string()))?;
        objects.insert(key, body);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| ArchiveError::Backend("memory archive mutex poisoned".to_string()))?;
        objects.get(key).cloned().ok_or_else(|| ArchiveError::NotFound {
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl ResultArchive for MemoryArchive {
    async fn put_result(&self, result: &CheckResult) -> Result<(), ArchiveError> {
        let body =
            serde_json::to_vec(result).map_err(|e| ArchiveError::Backend(e.to_string()))?;
        self.put(result_key(&result.check_id, &result.bastion_id), body)
    }

    async fn get_result_by_check_id(
        &self,
        bastion_id: &str,
        check_id: &str,
    ) -> Result<CheckResult, ArchiveError> {
        let body = self.get(&result_key(check_id, bastion_id))?;
        serde_json::from_slice(&body).map_err(|e| ArchiveError::Backend(e.to_string()))
    }

    async fn put_check_snapshot(
        &self,
        transition_id: i64,
        snapshot: &CheckSnapshot,
    ) -> Result<(), ArchiveError> {
        let body =
            serde_json::to_vec(snapshot).map_err(|e| ArchiveError::Backend(e.to_string()))?;
        self.put(snapshot_key(transition_id, &snapshot.check.id), body)
    }

    async fn get_check_snapshot(
        &self,
        transition_id: i64,
        check_id: &str,
    ) -> Result<CheckSnapshot, ArchiveError> {
        let body = self.get(&snapshot_key(transition_id, check_id))?;
        serde_json::from_slice(&body).map_err(|e| ArchiveError::Backend(e.to_string()))
    }
}
