// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::DetectionRule;
use aegis_domain::error::AegisError;
use aegis_domain::repositories::RuleSnapshot;
use aegis_domain::RuleStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// Loads `DetectionRule` documents (one tagged YAML document per file)
/// from a directory. `reload` re-reads the directory and swaps the
/// active snapshot only if every file parses; a malformed rule file
/// leaves the previously loaded rules serving traffic.
pub struct DirectoryRuleStore {
    dir: PathBuf,
    current: RwLock<Arc<RuleSnapshot>>,
}

impl DirectoryRuleStore {
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self, AegisError> {
        let dir = dir.into();
        let rules = read_rules(&dir).await?;
        Ok(Self { dir, current: RwLock::new(Arc::new(RuleSnapshot::new(rules))) })
    }
}

async fn read_rules(dir: &PathBuf) -> Result<Vec<DetectionRule>, AegisError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| AegisError::internal(format!("reading rules dir {}: {e}", dir.display())))?;
    let mut rules = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| AegisError::internal(e.to_string()))? {
        let path = entry.path();
        let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yml") | Some("yaml"));
        if !is_yaml {
            continue;
        }
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| AegisError::internal(format!("reading {}: {e}", path.display())))?;
        let rule: DetectionRule = serde_yaml::from_str(&contents).map_err(|e| AegisError::internal(format!("parsing {}: {e}", path.display())))?;
        rules.push(rule);
    }
    Ok(rules)
}

#[async_trait]
impl RuleStore for DirectoryRuleStore {
    fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.read().clone()
    }

    async fn reload(&self) -> Result<(), AegisError> {
        let rules = read_rules(&self.dir).await?;
        *self.current.write() = Arc::new(RuleSnapshot::new(rules));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_rules_from_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("failed_logins.yml"),
            r#"
type: custom
id: failed-logins
title: Repeated failed logins
severity: high
condition:
  op: and
  conditions:
    - field: event_type
      op: equals
      value: login_failure
"#,
        )
        .unwrap();

        let store = DirectoryRuleStore::load(dir.path()).await.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn reload_replaces_snapshot() {
        let dir = tempdir().unwrap();
        let store = DirectoryRuleStore::load(dir.path()).await.unwrap();
        assert!(store.snapshot().is_empty());

        std::fs::write(
            dir.path().join("r.yml"),
            r#"
type: custom
id: r1
title: t
severity: low
condition:
  op: and
"#,
        )
        .unwrap();
        store.reload().await.unwrap();
        assert_eq!(store.snapshot().len(), 1);
    }
}
