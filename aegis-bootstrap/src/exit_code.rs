// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process exit codes for every Aegis service process (collector,
//! processor, detector, responder, dispatcher).

use std::fmt;

/// The three exit codes a service process can terminate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean shutdown — ran to completion or was gracefully signalled.
    #[default]
    Clean = 0,
    /// Fatal configuration error discovered at startup: missing
    /// required env var, unparsable config file, invalid rule/playbook
    /// YAML in the configured directory.
    ConfigError = 1,
    /// A required dependency (message bus, cache, index) was still
    /// unreachable after startup's retry budget was exhausted.
    DependencyUnreachable = 2,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Clean => "clean shutdown",
            ExitCode::ConfigError => "fatal configuration error",
            ExitCode::DependencyUnreachable => "dependency unreachable past retry budget",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

/// Logs `error` at `error` level and returns the matching [`ExitCode`]
/// for a fatal startup failure, so every binary's `main` maps a failed
/// bootstrap the same way instead of each reimplementing the mapping.
pub fn exit_code_for_startup_error(error: &anyhow::Error) -> ExitCode {
    let message = error.to_string().to_lowercase();
    let code = if message.contains("unreachable") || message.contains("connection refused") || message.contains("timed out") {
        ExitCode::DependencyUnreachable
    } else {
        ExitCode::ConfigError
    };
    tracing::error!(error = %error, exit_code = code.as_i32(), "fatal startup error");
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_values_match_the_documented_contract() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::ConfigError.as_i32(), 1);
        assert_eq!(ExitCode::DependencyUnreachable.as_i32(), 2);
    }

    #[test]
    fn default_is_clean() {
        assert_eq!(ExitCode::default(), ExitCode::Clean);
    }

    #[test]
    fn is_success_only_true_for_clean() {
        assert!(ExitCode::Clean.is_success());
        assert!(!ExitCode::ConfigError.is_success());
        assert!(!ExitCode::DependencyUnreachable.is_success());
    }

    #[test]
    fn unreachable_dependency_message_maps_to_dependency_unreachable() {
        let error = anyhow::anyhow!("bus unreachable after 5 attempts");
        assert_eq!(exit_code_for_startup_error(&error), ExitCode::DependencyUnreachable);
    }

    #[test]
    fn other_startup_failure_maps_to_config_error() {
        let error = anyhow::anyhow!("missing required field 'kafka.bootstrap_servers'");
        assert_eq!(exit_code_for_startup_error(&error), ExitCode::ConfigError);
    }
}
