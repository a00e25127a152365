// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration
//!
//! Layered configuration (defaults → optional `config/aegis.toml` →
//! environment variables, `config` crate precedence) covering every
//! collaborator: the HTTP collector, Kafka, Redis, JWT, Elasticsearch,
//! rate limits, dedup, and the rule/playbook directories.

use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::net::IpAddr;

/// Explicit env-var → config-key mapping for the names the collector,
/// bus, cache, auth, and index adapters are documented to honor.
/// `ES_HOSTS` is handled separately below since it's a comma-separated
/// list, not a scalar.
const ENV_VAR_TO_KEY: &[(&str, &str)] = &[
    ("COLLECTOR_HOST", "collector.host"),
    ("COLLECTOR_PORT", "collector.port"),
    ("COLLECTOR_REQUEST_TIMEOUT_SECONDS", "collector.request_timeout_secs"),
    ("METRICS_PORT", "metrics_port"),
    ("KAFKA_BOOTSTRAP_SERVERS", "kafka.bootstrap_servers"),
    ("KAFKA_SECURITY_PROTOCOL", "kafka.security_protocol"),
    ("RAW_LOGS_TOPIC", "kafka.raw_logs_topic"),
    ("ENRICHED_LOGS_TOPIC", "kafka.enriched_logs_topic"),
    ("ALERTS_TOPIC", "kafka.alerts_topic"),
    ("DEAD_LETTER_TOPIC", "kafka.dead_letter_topic"),
    ("KAFKA_CLIENT_ID_PREFIX", "kafka.client_id_prefix"),
    ("REDIS_URL", "redis.url"),
    ("REDIS_MAX_CONNECTIONS", "redis.max_connections"),
    ("JWT_SECRET_KEY", "jwt.secret_key"),
    ("JWT_ALGORITHM", "jwt.algorithm"),
    ("ACCESS_TOKEN_EXPIRE_MINUTES", "jwt.access_token_expire_minutes"),
    ("JWT_USERS_DB_PATH", "jwt.users_db_path"),
    ("ES_USERNAME", "elasticsearch.username"),
    ("ES_PASSWORD", "elasticsearch.password"),
    ("ES_SSL_VERIFY", "elasticsearch.ssl_verify"),
    ("ES_INDEX_PREFIX", "elasticsearch.index_prefix"),
    ("RATE_LIMIT_DEFAULT_TIMES", "rate_limit.request.times"),
    ("RATE_LIMIT_DEFAULT_SECONDS", "rate_limit.request.seconds"),
    ("RATE_LIMIT_BATCH_TIMES", "rate_limit.batch.times"),
    ("RATE_LIMIT_BATCH_SECONDS", "rate_limit.batch.seconds"),
    ("RATE_LIMIT_EVENTS_TIMES", "rate_limit.events.times"),
    ("RATE_LIMIT_EVENTS_SECONDS", "rate_limit.events.seconds"),
    ("RATE_LIMIT_LOGIN_TIMES", "rate_limit.login.times"),
    ("RATE_LIMIT_LOGIN_SECONDS", "rate_limit.login.seconds"),
    ("DEDUP_WINDOW_SECONDS", "detection.dedup_window_seconds"),
    ("RULES_DIR", "detection.rules_dir"),
    ("PLAYBOOKS_DIR", "detection.playbooks_dir"),
    ("INDEX_RETRY_MAX_ATTEMPTS", "detection.index_retry_max_attempts"),
    ("MODELS_DIR", "detection.models_dir"),
    ("YARA_BLOB_FIELD", "detection.yara_blob_field"),
    ("RUN_LOG_DB_PATH", "response.run_log_db_path"),
    ("DISPATCH_RETRY_MAX_ATTEMPTS", "dispatch.retry_max_attempts"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Allowed CORS origins; empty means permissive (any origin), for
    /// local/dev use.
    #[serde(default)]
    pub cors_allowlist: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    #[serde(default)]
    pub security_protocol: Option<String>,
    pub raw_logs_topic: String,
    pub enriched_logs_topic: String,
    pub alerts_topic: String,
    pub dead_letter_topic: String,
    pub client_id_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret_key: String,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    #[serde(default = "default_users_db_path")]
    pub users_db_path: String,
}

fn default_users_db_path() -> String {
    "data/users.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElasticsearchConfig {
    pub hosts: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub ssl_verify: bool,
    pub index_prefix: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitRule {
    pub times: u32,
    pub seconds: u64,
}

/// Four independent ingestion/auth quotas, each enforced against its own
/// `RateLimiter` instance: `request` for `POST /ingest` (one event),
/// `batch` for `POST /ingest/batch` (counted per request regardless of
/// batch size), `events` for `POST /ingest/raw` (counted per parsed
/// event), and `login` for `POST /token`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub request: RateLimitRule,
    pub batch: RateLimitRule,
    pub events: RateLimitRule,
    pub login: RateLimitRule,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    pub rules_dir: String,
    pub playbooks_dir: String,
    pub dedup_window_seconds: u64,
    pub index_retry_max_attempts: u32,
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
    #[serde(default = "default_yara_blob_field")]
    pub yara_blob_field: String,
}

fn default_models_dir() -> String {
    "models".to_string()
}

fn default_yara_blob_field() -> String {
    "data.payload_base64".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailChannelConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChannelConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Every notification channel and the severity→channel-name routing
/// table for the Alert Dispatcher. A channel is only registered at
/// startup if its credentials are present — see
/// `presentation::cli::build_dispatcher`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_dispatch_retry_attempts")]
    pub retry_max_attempts: u32,
    /// Severity name (`low`/`medium`/`high`/`critical`) → channel names
    /// routed for it. Channel names match the keys under which each
    /// configured channel is registered (`"email"`, `"slack"`, ...).
    #[serde(default)]
    pub routing: std::collections::HashMap<String, Vec<String>>,
    #[serde(default)]
    pub email: Option<EmailChannelConfig>,
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
    #[serde(default)]
    pub telegram: Option<TelegramChannelConfig>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_dispatch_retry_attempts() -> u32 {
    3
}

/// Response-engine driver credentials. Like [`DispatchConfig`]'s
/// channels, a driver is only registered if configured — an unconfigured
/// driver simply never matches a playbook action naming it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseConfig {
    pub run_log_db_path: String,
    #[serde(default)]
    pub thehive: Option<ApiKeyDriverConfig>,
    #[serde(default)]
    pub cortex: Option<ApiKeyDriverConfig>,
    #[serde(default)]
    pub ansible_binary: Option<String>,
    #[serde(default)]
    pub python_interpreter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyDriverConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Processor enrichment data sources. Each field is independently
/// optional — an enricher is only built if its source is configured,
/// matching spec.md's "enrichment failures are non-fatal" posture
/// extended to "absent enrichment sources are simply skipped."
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub geoip_db_path: Option<String>,
    #[serde(default)]
    pub geoip_fields: Vec<String>,
    #[serde(default)]
    pub rdns_fields: Vec<String>,
    #[serde(default)]
    pub threat_intel_base_url: Option<String>,
    #[serde(default)]
    pub threat_intel_field: Option<String>,
    #[serde(default = "default_enrichment_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

fn default_enrichment_cache_ttl_seconds() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct AegisConfig {
    pub log_level: String,
    pub metrics_port: u16,
    pub collector: CollectorConfig,
    pub kafka: KafkaConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    pub detection: DetectionConfig,
}

impl AegisConfig {
    /// Loads configuration from (in ascending precedence) built-in
    /// defaults, an optional `config/aegis.toml`, and the specific
    /// environment variable names the collector, bus, cache, auth, and
    /// index adapters are documented to honor (`COLLECTOR_HOST`,
    /// `KAFKA_BOOTSTRAP_SERVERS`, `REDIS_URL`, `JWT_SECRET_KEY`,
    /// `ES_HOSTS`, ...). These don't follow a single nesting convention,
    /// so each is mapped explicitly rather than via a generic prefix
    /// separator. `RUST_LOG` is honored by the tracing env-filter
    /// directly; `LOG_LEVEL`, when set, takes precedence over it for
    /// `log_level`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("log_level", "info")?
            .set_default("metrics_port", 9090)?
            .set_default("collector.host", "0.0.0.0")?
            .set_default("collector.port", 8080)?
            .set_default("collector.cors_allowlist", Vec::<String>::new())?
            .set_default("collector.request_timeout_secs", 30)?
            .set_default("kafka.bootstrap_servers", "localhost:9092")?
            .set_default("kafka.raw_logs_topic", "raw_logs")?
            .set_default("kafka.enriched_logs_topic", "enriched_logs")?
            .set_default("kafka.alerts_topic", "alerts")?
            .set_default("kafka.dead_letter_topic", "dead_letters")?
            .set_default("kafka.client_id_prefix", "aegis")?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("redis.max_connections", 10)?
            .set_default("jwt.secret_key", "change-me")?
            .set_default("jwt.algorithm", "HS256")?
            .set_default("jwt.access_token_expire_minutes", 60)?
            .set_default("jwt.users_db_path", "data/users.db")?
            .set_default("elasticsearch.hosts", vec!["http://localhost:9200"])?
            .set_default("elasticsearch.ssl_verify", true)?
            .set_default("elasticsearch.index_prefix", "logs")?
            .set_default("rate_limit.request.times", 100)?
            .set_default("rate_limit.request.seconds", 60)?
            .set_default("rate_limit.batch.times", 50)?
            .set_default("rate_limit.batch.seconds", 60)?
            .set_default("rate_limit.events.times", 1000)?
            .set_default("rate_limit.events.seconds", 60)?
            .set_default("rate_limit.login.times", 5)?
            .set_default("rate_limit.login.seconds", 60)?
            .set_default("detection.rules_dir", "rules")?
            .set_default("detection.playbooks_dir", "playbooks")?
            .set_default("detection.dedup_window_seconds", 300)?
            .set_default("detection.index_retry_max_attempts", 5)?
            .set_default("detection.models_dir", "models")?
            .set_default("detection.yara_blob_field", "data.payload_base64")?
            .add_source(File::with_name("config/aegis").required(false));

        for (env_var, key) in ENV_VAR_TO_KEY {
            if let Ok(value) = std::env::var(env_var) {
                builder = builder.set_override(*key, value)?;
            }
        }
        if let Ok(hosts) = std::env::var("ES_HOSTS") {
            let hosts: Vec<String> = hosts.split(',').map(|h| h.trim().to_string()).collect();
            builder = builder.set_override("elasticsearch.hosts", hosts)?;
        }
        if let Ok(allowlist) = std::env::var("CORS_ALLOWLIST") {
            let origins: Vec<String> = allowlist.split(',').map(|o| o.trim().to_string()).collect();
            builder = builder.set_override("collector.cors_allowlist", origins)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn effective_log_level(&self) -> String {
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| self.log_level.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_load_without_any_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = AegisConfig::load().expect("defaults alone must be sufficient to load");
        assert_eq!(config.collector.port, 8080);
        assert_eq!(config.kafka.raw_logs_topic, "raw_logs");
    }

    #[test]
    fn named_env_var_overrides_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("COLLECTOR_PORT", "9999");
        let config = AegisConfig::load().unwrap();
        std::env::remove_var("COLLECTOR_PORT");
        assert_eq!(config.collector.port, 9999);
    }
}
