// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::Playbook;
use aegis_domain::error::AegisError;
use aegis_domain::PlaybookStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// Loads `Playbook` documents (one YAML document per file) from a
/// directory, mirroring [`crate::infrastructure::repositories::DirectoryRuleStore`]'s
/// load-all-or-keep-previous reload semantics.
pub struct DirectoryPlaybookStore {
    dir: PathBuf,
    current: RwLock<Arc<Vec<Playbook>>>,
}

impl DirectoryPlaybookStore {
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self, AegisError> {
        let dir = dir.into();
        let playbooks = read_playbooks(&dir).await?;
        Ok(Self { dir, current: RwLock::new(Arc::new(playbooks)) })
    }
}

async fn read_playbooks(dir: &PathBuf) -> Result<Vec<Playbook>, AegisError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| AegisError::internal(format!("reading playbooks dir {}: {e}", dir.display())))?;
    let mut playbooks = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| AegisError::internal(e.to_string()))? {
        let path = entry.path();
        let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yml") | Some("yaml"));
        if !is_yaml {
            continue;
        }
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| AegisError::internal(format!("reading {}: {e}", path.display())))?;
        let playbook: Playbook = serde_yaml::from_str(&contents).map_err(|e| AegisError::internal(format!("parsing {}: {e}", path.display())))?;
        playbooks.push(playbook);
    }
    Ok(playbooks)
}

#[async_trait]
impl PlaybookStore for DirectoryPlaybookStore {
    fn snapshot(&self) -> Arc<Vec<Playbook>> {
        self.current.read().clone()
    }

    async fn reload(&self) -> Result<(), AegisError> {
        let playbooks = read_playbooks(&self.dir).await?;
        *self.current.write() = Arc::new(playbooks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::{Alert, Severity};
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn loads_playbooks_from_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("contain.yml"),
            r#"
id: pb-1
name: Contain brute force
triggers:
  - field: rule_id
    op: equals
    value: failed-logins
actions:
  - name: block-ip
    action_type: ansible
    parameters:
      playbook: block_ip.yml
"#,
        )
        .unwrap();

        let store = DirectoryPlaybookStore::load(dir.path()).await.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);

        let alert = Alert::raise("failed-logins", "Failed logins", Severity::High, "desc", Uuid::new_v4(), serde_json::json!({}), vec![]).unwrap();
        assert!(snapshot[0].triggered_by(&alert));
    }
}
