// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Wires configuration to concrete adapters and runs one pipeline role
//! per invocation. Kept deliberately thin: every decision here is either
//! "which adapter implements this port" or "which config field feeds
//! which constructor" — the actual pipeline logic lives in
//! [`crate::application`].

use crate::application::collector::CollectorService;
use crate::application::detection::{anomaly::AnomalyEvaluator, anomaly::AnomalyModel, custom::CustomEvaluator, sigma::SigmaEvaluator, yara::YaraEvaluator, DetectionEngine, RuleEvaluator};
use crate::application::dispatch::channels::{AlertChannel, DiscordChannel, EmailChannel, SlackChannel, TelegramChannel, WebhookChannel};
use crate::application::dispatch::{AlertDispatcher, RoutingTable};
use crate::application::response::drivers::{ActionDriver, AnsibleDriver, CortexDriver, PythonDriver, TheHiveDriver, WebhookDriver};
use crate::application::response::PlaybookRunner;
use crate::infrastructure::auth::{hash_password, InMemoryUserStore, JwtAuthService, SqliteUserStore};
use crate::infrastructure::bus::{InMemoryBus, KafkaBus, KafkaConsumer};
use crate::infrastructure::config::{AegisConfig, DetectionConfig};
use crate::infrastructure::dedup::TtlLruCache;
use crate::infrastructure::enrich::{GeoIpEnricher, ReverseDnsEnricher, ThreatIntelEnricher};
use crate::infrastructure::http::{build_router, AppState, RateLimitQuota};
use crate::infrastructure::index::{EsIndexClient, InMemoryIndexClient};
use crate::infrastructure::parsers::default_parsers;
use crate::infrastructure::rate_limit::{InMemoryLoginAttemptTracker, InMemoryRateLimiter, RedisLoginAttemptTracker, RedisRateLimiter};
use crate::infrastructure::repositories::{DirectoryPlaybookStore, DirectoryRuleStore, SqlitePlaybookRunLog};
use aegis_domain::repositories::{Consumer, HealthCheck, IndexClient, LifecyclePolicy, LoginAttemptTracker, MessageBus, PlaybookStore, RuleStore};
use aegis_domain::services::auth::{AuthService, UserStore};
use aegis_domain::services::enrich::Enricher;
use aegis_domain::{entities::Severity, RateLimiter};
use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aegis", version, about = "Log ingestion, detection, and response pipeline")]
pub struct Cli {
    /// Use in-process adapters (no Kafka/Redis) instead of the configured
    /// backends. Only meaningful for a single process — other roles in
    /// separate processes can't see this one's in-memory bus or cache.
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub role: Role,
}

#[derive(Subcommand)]
pub enum Role {
    /// HTTP ingest surface: `/token`, `/health`, `/ingest*`.
    Collector,
    /// Dedup, normalize, enrich, index, and forward to detection.
    Processor,
    /// Evaluate detection rules against enriched events.
    Detector {
        #[command(subcommand)]
        action: Option<DetectorAction>,
    },
    /// Run playbook actions triggered by raised alerts.
    Responder,
    /// Fan raised alerts out to notification channels.
    Dispatcher,
    /// Run every role in this one process (in-memory bus/cache are most
    /// useful here, since they're shared across roles in-process).
    All,
}

#[derive(Subcommand)]
pub enum DetectorAction {
    /// Fits a mean/stddev baseline for `rule_id.field` from a
    /// newline-delimited file of numeric samples and writes it to the
    /// models directory for the anomaly evaluator to pick up.
    Train {
        rule_id: String,
        field: String,
        samples: PathBuf,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AegisConfig::load()?;
    crate::infrastructure::logging::init(&config.effective_log_level());

    match cli.role {
        Role::Collector => run_collector(&config, cli.in_memory).await,
        Role::Processor => run_processor(&config, cli.in_memory).await,
        Role::Detector { action: None } => run_detector(&config, cli.in_memory).await,
        Role::Detector { action: Some(DetectorAction::Train { rule_id, field, samples }) } => train_anomaly_model(&config, &rule_id, &field, &samples).await,
        Role::Responder => run_responder(&config, cli.in_memory).await,
        Role::Dispatcher => run_dispatcher(&config, cli.in_memory).await,
        Role::All => run_all(&config, cli.in_memory).await,
    }
}

const GRACE_PERIOD: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_secs(5);
const DEDUP_CAPACITY: usize = 100_000;
const THROTTLE_CAPACITY: usize = 100_000;
const DEFAULT_THROTTLE_WINDOW_SECS: u64 = 300;
const RELOAD_INTERVAL: Duration = Duration::from_secs(30);

/// A running bus and the means to attach a consumer to it, abstracting
/// over Kafka versus the in-memory stand-in so the rest of the CLI
/// builds pipeline services without caring which backend is live.
enum Backend {
    Memory(Arc<InMemoryBus>),
    Kafka { bootstrap_servers: String, bus: Arc<KafkaBus> },
}

impl Backend {
    fn new(in_memory: bool, bootstrap_servers: &str) -> anyhow::Result<Self> {
        if in_memory {
            Ok(Self::Memory(Arc::new(InMemoryBus::new())))
        } else {
            Ok(Self::Kafka { bootstrap_servers: bootstrap_servers.to_string(), bus: Arc::new(KafkaBus::new(bootstrap_servers)?) })
        }
    }

    fn bus(&self) -> Arc<dyn MessageBus> {
        match self {
            Self::Memory(bus) => bus.clone(),
            Self::Kafka { bus, .. } => bus.clone(),
        }
    }

    fn health(&self) -> Arc<dyn HealthCheck> {
        match self {
            Self::Memory(bus) => bus.clone(),
            Self::Kafka { bus, .. } => bus.clone(),
        }
    }

    fn consumer(&self, group_id: &str, topic: &str) -> anyhow::Result<Arc<dyn Consumer>> {
        match self {
            Self::Memory(bus) => Ok(Arc::new(bus.consumer(topic)?)),
            Self::Kafka { bootstrap_servers, .. } => Ok(Arc::new(KafkaConsumer::new(bootstrap_servers, group_id, topic)?)),
        }
    }
}

/// The shared cache backend behind rate limiting and login-attempt
/// tracking, mirroring [`Backend`]'s Kafka/in-memory split for the bus.
enum Cache {
    Memory,
    Redis(redis::aio::ConnectionManager),
}

impl Cache {
    async fn new(in_memory: bool, redis_url: &str) -> anyhow::Result<Self> {
        if in_memory {
            Ok(Self::Memory)
        } else {
            let client = redis::Client::open(redis_url)?;
            let conn = redis::aio::ConnectionManager::new(client).await?;
            Ok(Self::Redis(conn))
        }
    }

    fn rate_limiter(&self, key_prefix: &'static str, times: u32, seconds: u64) -> Arc<dyn RateLimiter> {
        match self {
            Self::Memory => Arc::new(InMemoryRateLimiter::new(times, seconds)),
            Self::Redis(conn) => Arc::new(RedisRateLimiter::new(conn.clone(), key_prefix, times, seconds)),
        }
    }

    fn login_attempts(&self) -> Arc<dyn LoginAttemptTracker> {
        match self {
            Self::Memory => Arc::new(InMemoryLoginAttemptTracker::new()),
            Self::Redis(conn) => Arc::new(RedisLoginAttemptTracker::new(conn.clone())),
        }
    }

    fn health(&self, times: u32, seconds: u64) -> Arc<dyn HealthCheck> {
        match self {
            Self::Memory => Arc::new(InMemoryRateLimiter::new(times, seconds)),
            Self::Redis(conn) => Arc::new(RedisRateLimiter::new(conn.clone(), "health", times, seconds)),
        }
    }
}

async fn build_index(config: &AegisConfig, in_memory: bool) -> anyhow::Result<Arc<dyn IndexClient>> {
    if in_memory {
        return Ok(Arc::new(InMemoryIndexClient::new()));
    }
    let es = &config.elasticsearch;
    let index: Arc<dyn IndexClient> = Arc::new(EsIndexClient::new(es.hosts.clone(), es.username.clone(), es.password.clone(), es.ssl_verify)?);
    index.ensure_template(&es.index_prefix, LifecyclePolicy::default()).await.ok();
    Ok(index)
}

async fn build_auth(config: &AegisConfig, cache: &Cache, in_memory: bool) -> anyhow::Result<Arc<dyn AuthService>> {
    let users: Arc<dyn UserStore> = if in_memory {
        Arc::new(InMemoryUserStore::new())
    } else {
        let pool = SqlitePoolOptions::new().connect(&format!("sqlite://{}?mode=rwc", config.jwt.users_db_path)).await?;
        let store = SqliteUserStore::new(pool);
        store.migrate().await?;
        Arc::new(store)
    };
    Ok(Arc::new(JwtAuthService::new(&config.jwt.secret_key, config.jwt.access_token_expire_minutes, users, cache.login_attempts())))
}

async fn run_collector(config: &AegisConfig, in_memory: bool) -> anyhow::Result<()> {
    let backend = Backend::new(in_memory, &config.kafka.bootstrap_servers)?;
    let cache = Cache::new(in_memory, &config.redis.url).await?;

    let collector = Arc::new(CollectorService::new(backend.bus(), config.kafka.raw_logs_topic.clone(), Duration::from_secs(5), default_parsers()));
    let auth = build_auth(config, &cache, in_memory).await?;
    let request_limiter = cache.rate_limiter("request", config.rate_limit.request.times, config.rate_limit.request.seconds);
    let batch_limiter = cache.rate_limiter("batch", config.rate_limit.batch.times, config.rate_limit.batch.seconds);
    let events_limiter = cache.rate_limiter("events", config.rate_limit.events.times, config.rate_limit.events.seconds);
    let login_limiter = cache.rate_limiter("login", config.rate_limit.login.times, config.rate_limit.login.seconds);
    let cache_health = cache.health(config.rate_limit.request.times, config.rate_limit.request.seconds);

    let state = AppState::new(collector, auth, request_limiter, batch_limiter, events_limiter, login_limiter.clone(), backend.health(), cache_health);
    let login_quota = RateLimitQuota { times: config.rate_limit.login.times, window_seconds: config.rate_limit.login.seconds };
    let request_quota = RateLimitQuota { times: config.rate_limit.request.times, window_seconds: config.rate_limit.request.seconds };
    let batch_quota = RateLimitQuota { times: config.rate_limit.batch.times, window_seconds: config.rate_limit.batch.seconds };
    let events_quota = RateLimitQuota { times: config.rate_limit.events.times, window_seconds: config.rate_limit.events.seconds };
    let router = build_router(state, &config.collector.cors_allowlist, config.collector.request_timeout_secs, login_quota, request_quota, batch_quota, events_quota);

    let addr = std::net::SocketAddr::new(config.collector.host, config.collector.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "collector listening");

    let coordinator = aegis_bootstrap::ShutdownCoordinator::new(GRACE_PERIOD);
    let token = coordinator.token();
    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        aegis_bootstrap::create_signal_handler().wait_for_signal(Box::new(move || signal_coordinator.initiate_shutdown())).await;
    });

    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    coordinator.complete_shutdown();
    Ok(())
}

async fn run_processor(config: &AegisConfig, in_memory: bool) -> anyhow::Result<()> {
    let backend = Backend::new(in_memory, &config.kafka.bootstrap_servers)?;
    let consumer = backend.consumer("aegis-processor", &config.kafka.raw_logs_topic)?;
    let index = build_index(config, in_memory).await?;
    let enrichers = build_enrichers(&config.enrichment).await?;
    let dedup = TtlLruCache::new(DEDUP_CAPACITY, Duration::from_secs(config.detection.dedup_window_seconds));

    let processor = crate::application::processor::ProcessorService::new(
        backend.bus(),
        consumer,
        index,
        dedup,
        enrichers,
        config.elasticsearch.index_prefix.clone(),
        config.kafka.enriched_logs_topic.clone(),
        config.kafka.dead_letter_topic.clone(),
        config.detection.index_retry_max_attempts,
        Duration::from_secs(5),
    );

    aegis_bootstrap::run_until_shutdown(GRACE_PERIOD, || async { processor.run_once(POLL_TIMEOUT).await.map(|_| ()).map_err(anyhow::Error::from) }).await
}

async fn build_enrichers(config: &crate::infrastructure::config::EnrichmentConfig) -> anyhow::Result<Vec<Arc<dyn Enricher>>> {
    let mut enrichers: Vec<Arc<dyn Enricher>> = Vec::new();
    let ttl = Duration::from_secs(config.cache_ttl_seconds);

    if let Some(db_path) = &config.geoip_db_path {
        enrichers.push(Arc::new(GeoIpEnricher::open(db_path, config.geoip_fields.clone()).await?));
    }
    if !config.rdns_fields.is_empty() {
        enrichers.push(Arc::new(ReverseDnsEnricher::new(config.rdns_fields.clone(), ttl)));
    }
    if let (Some(base_url), Some(field)) = (&config.threat_intel_base_url, &config.threat_intel_field) {
        enrichers.push(Arc::new(ThreatIntelEnricher::new(base_url.clone(), field.clone(), "ip", ttl)));
    }
    Ok(enrichers)
}

fn build_rule_evaluators(detection: &DetectionConfig, anomaly: AnomalyEvaluator) -> Vec<Arc<dyn RuleEvaluator>> {
    vec![
        Arc::new(CustomEvaluator::new()),
        Arc::new(SigmaEvaluator::new()),
        Arc::new(YaraEvaluator::new(detection.yara_blob_field.clone())),
        Arc::new(anomaly),
    ]
}

async fn run_detector(config: &AegisConfig, in_memory: bool) -> anyhow::Result<()> {
    let backend = Backend::new(in_memory, &config.kafka.bootstrap_servers)?;
    let consumer = backend.consumer("aegis-detector", &config.kafka.enriched_logs_topic)?;

    let rule_store: Arc<dyn RuleStore> = Arc::new(DirectoryRuleStore::load(config.detection.rules_dir.clone()).await?);
    spawn_periodic_reload(rule_store.clone(), "rules");

    let anomaly = AnomalyEvaluator::load(&config.detection.models_dir).await?;
    let evaluators = build_rule_evaluators(&config.detection, anomaly);
    // Each rule's own `throttle_window_secs` governs its entries via
    // `check_and_insert_with_ttl`; this default only covers rules that
    // somehow bypass that path.
    let throttle = TtlLruCache::new(THROTTLE_CAPACITY, Duration::from_secs(DEFAULT_THROTTLE_WINDOW_SECS));

    let engine = DetectionEngine::new(backend.bus(), consumer, rule_store, evaluators, throttle, config.kafka.alerts_topic.clone(), Duration::from_secs(5));

    aegis_bootstrap::run_until_shutdown(GRACE_PERIOD, || async { engine.run_once(POLL_TIMEOUT).await.map(|_| ()).map_err(anyhow::Error::from) }).await
}

async fn run_responder(config: &AegisConfig, in_memory: bool) -> anyhow::Result<()> {
    let backend = Backend::new(in_memory, &config.kafka.bootstrap_servers)?;
    let consumer = backend.consumer("aegis-responder", &config.kafka.alerts_topic)?;

    let playbook_store: Arc<dyn PlaybookStore> = Arc::new(DirectoryPlaybookStore::load(config.detection.playbooks_dir.clone()).await?);
    spawn_periodic_reload(playbook_store.clone(), "playbooks");

    let run_log_path = if config.response.run_log_db_path.is_empty() { "data/playbook_runs.db".to_string() } else { config.response.run_log_db_path.clone() };
    let pool = SqlitePoolOptions::new().connect(&format!("sqlite://{run_log_path}?mode=rwc")).await?;
    let run_log = Arc::new(SqlitePlaybookRunLog::new(pool));
    run_log.migrate().await?;

    let mut drivers: Vec<Arc<dyn ActionDriver>> = vec![Arc::new(WebhookDriver::new())];
    if let Some(thehive) = &config.response.thehive {
        drivers.push(Arc::new(TheHiveDriver::new(thehive.base_url.clone(), thehive.api_key.clone())));
    }
    if let Some(cortex) = &config.response.cortex {
        drivers.push(Arc::new(CortexDriver::new(cortex.base_url.clone(), cortex.api_key.clone())));
    }
    if let Some(binary) = &config.response.ansible_binary {
        drivers.push(Arc::new(AnsibleDriver::new(binary.clone())));
    }
    if let Some(interpreter) = &config.response.python_interpreter {
        drivers.push(Arc::new(PythonDriver::new(interpreter.clone())));
    }

    let runner = PlaybookRunner::new(consumer, playbook_store, drivers, run_log);
    aegis_bootstrap::run_until_shutdown(GRACE_PERIOD, || async { runner.run_once(POLL_TIMEOUT).await.map(|_| ()).map_err(anyhow::Error::from) }).await
}

fn parse_severity(name: &str) -> Option<Severity> {
    match name.to_ascii_lowercase().as_str() {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

fn build_dispatch(config: &crate::infrastructure::config::DispatchConfig) -> (RoutingTable, Vec<Arc<dyn AlertChannel>>) {
    let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();

    if let Some(email) = &config.email {
        match EmailChannel::new(&email.smtp_host, &email.username, &email.password, email.from.clone(), email.to.clone()) {
            Ok(channel) => channels.push(Arc::new(channel)),
            Err(err) => warn!(error = %err, "email channel configured but could not be constructed, skipping"),
        }
    }
    if let Some(url) = &config.slack_webhook_url {
        channels.push(Arc::new(SlackChannel::new(url.clone())));
    }
    if let Some(url) = &config.discord_webhook_url {
        channels.push(Arc::new(DiscordChannel::new(url.clone())));
    }
    if let Some(telegram) = &config.telegram {
        channels.push(Arc::new(TelegramChannel::new(telegram.bot_token.clone(), telegram.chat_id.clone())));
    }
    if let Some(url) = &config.webhook_url {
        channels.push(Arc::new(WebhookChannel::new(url.clone())));
    }

    let mut routes: HashMap<Severity, Vec<String>> = HashMap::new();
    for (severity_name, channel_names) in &config.routing {
        match parse_severity(severity_name) {
            Some(severity) => {
                routes.insert(severity, channel_names.clone());
            }
            None => warn!(severity = %severity_name, "unrecognized severity in dispatch routing config, ignoring"),
        }
    }

    (RoutingTable::new(routes), channels)
}

async fn run_dispatcher(config: &AegisConfig, in_memory: bool) -> anyhow::Result<()> {
    let backend = Backend::new(in_memory, &config.kafka.bootstrap_servers)?;
    let consumer = backend.consumer("aegis-dispatcher", &config.kafka.alerts_topic)?;

    let (routing, channels) = build_dispatch(&config.dispatch);
    let dispatcher = AlertDispatcher::new(consumer, routing, channels, config.dispatch.retry_max_attempts);

    aegis_bootstrap::run_until_shutdown(GRACE_PERIOD, || async { dispatcher.run_once(POLL_TIMEOUT).await.map(|_| ()).map_err(anyhow::Error::from) }).await
}

/// Polls a file-backed rule/playbook store for changes every
/// [`RELOAD_INTERVAL`] — there's no file-watcher crate in the dependency
/// stack, so this trades immediacy for simplicity; a reload failure is
/// logged and the previous snapshot keeps serving.
fn spawn_periodic_reload<S>(store: Arc<S>, label: &'static str)
where
    S: RuleStoreOrPlaybookStore + ?Sized + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RELOAD_INTERVAL).await;
            if let Err(err) = store.reload_dyn().await {
                warn!(store = label, error = %err, "periodic reload failed, keeping previous snapshot");
            }
        }
    });
}

/// A tiny seam so [`spawn_periodic_reload`] works for both
/// [`RuleStore`] and [`PlaybookStore`] without duplicating the loop.
trait RuleStoreOrPlaybookStore: Send + Sync {
    fn reload_dyn(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), aegis_domain::error::AegisError>> + Send + '_>>;
}

impl RuleStoreOrPlaybookStore for dyn RuleStore {
    fn reload_dyn(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), aegis_domain::error::AegisError>> + Send + '_>> {
        self.reload()
    }
}

impl RuleStoreOrPlaybookStore for dyn PlaybookStore {
    fn reload_dyn(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), aegis_domain::error::AegisError>> + Send + '_>> {
        self.reload()
    }
}

async fn train_anomaly_model(config: &AegisConfig, rule_id: &str, field: &str, samples_path: &PathBuf) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(samples_path).await?;
    let samples: Vec<f64> = contents.lines().filter(|line| !line.trim().is_empty()).map(|line| line.trim().parse::<f64>()).collect::<Result<_, _>>()?;
    if samples.is_empty() {
        anyhow::bail!("no numeric samples found in {}", samples_path.display());
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    let model = AnomalyModel { mean, stddev: variance.sqrt(), sample_count: samples.len() as u64 };

    AnomalyEvaluator::persist_model(&config.detection.models_dir, rule_id, &model).await?;
    info!(rule_id, field, sample_count = model.sample_count, mean = model.mean, stddev = model.stddev, "fitted and persisted anomaly baseline");
    Ok(())
}

/// Runs every role concurrently in this process. With `--in-memory`, this
/// is the only way the roles can actually see each other's messages,
/// since the in-memory bus and cache are per-process.
async fn run_all(config: &AegisConfig, in_memory: bool) -> anyhow::Result<()> {
    tokio::try_join!(run_collector(config, in_memory), run_processor(config, in_memory), run_detector(config, in_memory), run_responder(config, in_memory), run_dispatcher(config, in_memory),)?;
    Ok(())
}

/// Provisions a user directly against the configured user store —
/// exposed for operators seeding the first account; not a CLI
/// subcommand since it needs direct database access rather than a
/// running service.
#[allow(dead_code)]
pub async fn provision_user(db_path: &str, username: &str, password: &str, scopes: Vec<String>) -> anyhow::Result<()> {
    let pool = SqlitePoolOptions::new().connect(&format!("sqlite://{db_path}?mode=rwc")).await?;
    let store = SqliteUserStore::new(pool);
    store.migrate().await?;
    let hash = hash_password(password)?;
    let user = aegis_domain::entities::User::new(username, scopes.into_iter().collect(), hash);
    store.upsert(&user).await?;
    Ok(())
}
