// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Entities
//!
//! Objects with distinct identity that can change state over time while
//! keeping that identity: [`Event`] (mutated only by the Processor's
//! enrichment step), [`User`], [`DetectionRule`], [`Alert`] (append-only),
//! [`Playbook`].

mod alert;
mod event;
mod playbook;
mod rule;
mod user;

pub use alert::Alert;
pub use event::{Event, EventBatch, NewEvent, RawLogRequest};
pub use playbook::{ActionCondition, Playbook, PlaybookAction, PlaybookRunRecord, RunStatus};
pub use rule::{
    evaluate_field_operator, AnomalyRule, ConditionGroup, CustomRule, DetectionRule, FieldCondition, FieldOperator,
    LogicalOp, RuleMeta, Severity, SigmaRule, ThrottleScope, YaraRuleSet,
};
pub use user::User;
