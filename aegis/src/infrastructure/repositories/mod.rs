// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! [`aegis_domain::repositories::RuleStore`]/[`aegis_domain::repositories::PlaybookStore`]
//! adapters (hot-reloadable directories of YAML documents) and the
//! `sqlx` store for playbook run history.

mod playbook_store;
mod rule_store;
mod run_log;

pub use playbook_store::DirectoryPlaybookStore;
pub use rule_store::DirectoryRuleStore;
pub use run_log::SqlitePlaybookRunLog;
