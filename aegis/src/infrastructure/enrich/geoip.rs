// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::Event;
use aegis_domain::error::AegisError;
use aegis_domain::services::enrich::Enricher;
use async_trait::async_trait;
use maxminddb::geoip2;
use serde_json::json;
use std::net::IpAddr;

/// Attaches `enriched.geo` (country, city, lat/lon) for the first
/// configured field that holds a parseable IP address. Looked up
/// against a local MaxMind-format database; a missing database file or
/// a lookup miss is not an error — the event is enriched with whatever
/// fields it already has.
pub struct GeoIpEnricher {
    reader: maxminddb::Reader<Vec<u8>>,
    fields: Vec<String>,
}

impl GeoIpEnricher {
    pub async fn open(db_path: &str, fields: Vec<String>) -> Result<Self, AegisError> {
        let bytes = tokio::fs::read(db_path).await.map_err(|e| AegisError::internal(format!("reading geoip database {db_path}: {e}")))?;
        let reader = maxminddb::Reader::from_source(bytes).map_err(|e| AegisError::internal(format!("parsing geoip database {db_path}: {e}")))?;
        Ok(Self { reader, fields })
    }
}

#[async_trait]
impl Enricher for GeoIpEnricher {
    fn name(&self) -> &'static str {
        "geoip"
    }

    async fn enrich(&self, event: &mut Event) -> Result<(), AegisError> {
        for field in &self.fields {
            let Some(value) = event.get_path(field) else { continue };
            let Some(ip_str) = value.as_str() else { continue };
            let Ok(ip) = ip_str.parse::<IpAddr>() else { continue };

            let city: geoip2::City = match self.reader.lookup(ip) {
                Ok(Some(city)) => city,
                Ok(None) => continue,
                Err(e) => return Err(AegisError::internal(e.to_string())),
            };

            let country = city.country.as_ref().and_then(|c| c.iso_code).unwrap_or("");
            let city_name = city.city.as_ref().and_then(|c| c.names.as_ref()).and_then(|names| names.get("en")).copied().unwrap_or("");
            let (lat, lon) = city.location.as_ref().map(|l| (l.latitude, l.longitude)).unwrap_or((None, None));

            event.enrich("geo", json!({ "field": field, "country": country, "city": city_name, "lat": lat, "lon": lon }));
            return Ok(());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_database_file_is_reported_as_error() {
        let result = GeoIpEnricher::open("/nonexistent/geoip.mmdb", vec!["data.src_ip".into()]).await;
        assert!(result.is_err());
    }
}
