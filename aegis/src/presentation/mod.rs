// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `clap`-based CLI surface. One binary, one subcommand per pipeline
//! role, so a deployment can run any stage (or all of them, for a single
//! small instance) without separate crates.

pub mod cli;

pub use cli::{Cli, Role};
