// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("action timed out after {0:?}")]
    Timeout(Duration),
    #[error("action failed: {0}")]
    Failed(String),
}

/// What an external system reported back for one action call.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    pub detail: Option<String>,
}

/// One external-system integration a playbook action can target,
/// named by `action_type` (`"thehive"`, `"cortex"`, `"ansible"`,
/// `"python"`, `"webhook"`). `call` is responsible only for the
/// external-system protocol; the caller enforces `timeout` externally
/// via `tokio::time::timeout` so a hung driver can't block a whole
/// playbook run indefinitely.
#[async_trait]
pub trait ActionDriver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn call(&self, rendered: Value) -> Result<ActionOutcome, DriverError>;
}

/// Runs `driver.call` under a deadline, turning an elapsed timeout into
/// a [`DriverError::Timeout`] rather than leaving the caller to notice.
pub async fn call_with_timeout(driver: &dyn ActionDriver, rendered: Value, timeout: Duration) -> Result<ActionOutcome, DriverError> {
    match tokio::time::timeout(timeout, driver.call(rendered)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(DriverError::Timeout(timeout)),
    }
}

fn string_param(rendered: &Value, key: &str) -> Option<String> {
    rendered.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Raises or updates a case in TheHive via its REST case-management API.
pub struct TheHiveDriver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TheHiveDriver {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl ActionDriver for TheHiveDriver {
    fn name(&self) -> &'static str {
        "thehive"
    }

    async fn call(&self, rendered: Value) -> Result<ActionOutcome, DriverError> {
        let url = format!("{}/api/v1/case", self.base_url);
        let response = self.client.post(&url).bearer_auth(&self.api_key).json(&rendered).send().await.map_err(|e| DriverError::Failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DriverError::Failed(format!("TheHive returned {}", response.status())));
        }
        Ok(ActionOutcome { success: true, detail: Some(format!("case created at {url}")) })
    }
}

/// Submits an analyzer job to Cortex.
pub struct CortexDriver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CortexDriver {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl ActionDriver for CortexDriver {
    fn name(&self) -> &'static str {
        "cortex"
    }

    async fn call(&self, rendered: Value) -> Result<ActionOutcome, DriverError> {
        let analyzer = string_param(&rendered, "analyzer").ok_or_else(|| DriverError::Failed("cortex action missing 'analyzer' parameter".into()))?;
        let url = format!("{}/api/analyzer/{}/run", self.base_url, analyzer);
        let response = self.client.post(&url).bearer_auth(&self.api_key).json(&rendered).send().await.map_err(|e| DriverError::Failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DriverError::Failed(format!("Cortex returned {}", response.status())));
        }
        Ok(ActionOutcome { success: true, detail: Some(format!("analyzer '{analyzer}' submitted")) })
    }
}

/// Runs an Ansible playbook by shelling out to `ansible-playbook`, with
/// `rendered` passed as `--extra-vars` JSON. The binary path is
/// configurable so tests can point it at a stub.
pub struct AnsibleDriver {
    binary: String,
}

impl AnsibleDriver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl ActionDriver for AnsibleDriver {
    fn name(&self) -> &'static str {
        "ansible"
    }

    async fn call(&self, rendered: Value) -> Result<ActionOutcome, DriverError> {
        let playbook = string_param(&rendered, "playbook").ok_or_else(|| DriverError::Failed("ansible action missing 'playbook' parameter".into()))?;
        let extra_vars = serde_json::to_string(&rendered).map_err(|e| DriverError::Failed(e.to_string()))?;

        let output = Command::new(&self.binary)
            .arg(&playbook)
            .arg("--extra-vars")
            .arg(extra_vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DriverError::Failed(format!("spawning {}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(DriverError::Failed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(ActionOutcome { success: true, detail: Some(String::from_utf8_lossy(&output.stdout).to_string()) })
    }
}

/// The generic "user-defined driver": shells out to an external
/// interpreter running a script path declared in the action's
/// parameters, passing the rendered parameter bag as JSON on stdin. No
/// dynamic in-process code loading — the interpreter and script are
/// both operator-configured, never derived from event data.
pub struct PythonDriver {
    interpreter: String,
}

impl PythonDriver {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self { interpreter: interpreter.into() }
    }
}

#[async_trait]
impl ActionDriver for PythonDriver {
    fn name(&self) -> &'static str {
        "python"
    }

    async fn call(&self, rendered: Value) -> Result<ActionOutcome, DriverError> {
        let script = string_param(&rendered, "script").ok_or_else(|| DriverError::Failed("python action missing 'script' parameter".into()))?;

        let mut child = Command::new(&self.interpreter)
            .arg(&script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DriverError::Failed(format!("spawning {}: {e}", self.interpreter)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&rendered).map_err(|e| DriverError::Failed(e.to_string()))?;
            stdin.write_all(&payload).await.map_err(|e| DriverError::Failed(e.to_string()))?;
        }

        let output = child.wait_with_output().await.map_err(|e| DriverError::Failed(e.to_string()))?;
        if !output.status.success() {
            return Err(DriverError::Failed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(ActionOutcome { success: true, detail: Some(String::from_utf8_lossy(&output.stdout).to_string()) })
    }
}

/// Generic JSON POST to a webhook URL declared in the action's
/// parameters — the catch-all driver for systems with no dedicated
/// integration.
pub struct WebhookDriver {
    client: reqwest::Client,
}

impl WebhookDriver {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for WebhookDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionDriver for WebhookDriver {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn call(&self, rendered: Value) -> Result<ActionOutcome, DriverError> {
        let url = string_param(&rendered, "url").ok_or_else(|| DriverError::Failed("webhook action missing 'url' parameter".into()))?;
        let response = self.client.post(&url).json(&rendered).send().await.map_err(|e| DriverError::Failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DriverError::Failed(format!("webhook returned {}", response.status())));
        }
        Ok(ActionOutcome { success: true, detail: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn webhook_driver_requires_url_parameter() {
        let driver = WebhookDriver::new();
        let result = driver.call(json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn call_with_timeout_reports_timeout_error() {
        struct SlowDriver;
        #[async_trait]
        impl ActionDriver for SlowDriver {
            fn name(&self) -> &'static str {
                "slow"
            }
            async fn call(&self, _rendered: Value) -> Result<ActionOutcome, DriverError> {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(ActionOutcome { success: true, detail: None })
            }
        }

        let result = call_with_timeout(&SlowDriver, json!({}), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(DriverError::Timeout(_))));
    }

    #[tokio::test]
    async fn python_driver_reports_missing_script_parameter() {
        let driver = PythonDriver::new("python3");
        let result = driver.call(json!({})).await;
        assert!(result.is_err());
    }
}
