// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::entities::Event;
use crate::error::AegisError;
use async_trait::async_trait;

/// A single enrichment step the Processor runs over an accepted event
/// before indexing (GeoIP lookup, reverse DNS, threat-intel matching).
///
/// Enrichers are non-fatal: a failing enricher records an error on the
/// event via [`Event::record_enrichment_error`] rather than aborting
/// processing, so one broken lookup never blocks ingestion of the rest
/// of an event's data.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// A short name used in `enriched.errors[].enricher` and in metrics
    /// labels, e.g. `"geoip"`, `"rdns"`, `"threat_intel"`.
    fn name(&self) -> &'static str;

    /// Attempts to enrich `event` in place. Returning `Err` signals the
    /// Processor to record the error on the event and continue; it must
    /// never be used to reject the event outright.
    async fn enrich(&self, event: &mut Event) -> Result<(), AegisError>;
}
