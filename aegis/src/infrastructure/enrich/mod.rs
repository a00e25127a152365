// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete [`aegis_domain::services::enrich::Enricher`] implementations
//! run by the Processor: GeoIP, reverse DNS, and threat-intel lookups.
//! Every field they attempt to read is configurable, since the
//! IP-bearing field name varies by log source.

mod geoip;
mod rdns;
mod threat_intel;

pub use geoip::GeoIpEnricher;
pub use rdns::ReverseDnsEnricher;
pub use threat_intel::ThreatIntelEnricher;
