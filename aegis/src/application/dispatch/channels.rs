// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::{Alert, Severity};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The send attempt failed in a way that won't change by retrying
    /// (malformed recipient, rejected payload).
    #[error("{0}")]
    Permanent(String),
    /// The send attempt failed in a way a later retry might recover
    /// from (connection refused, non-2xx from a webhook).
    #[error("{0}")]
    Transient(String),
}

/// One outbound notification target an alert can be routed to, named by
/// [`AlertChannel::name`] so [`super::RoutingTable`] entries can refer to
/// it by string.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError>;
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "#6c757d",
        Severity::Medium => "#f0ad4e",
        Severity::High => "#d9534f",
        Severity::Critical => "#8b0000",
    }
}

/// Renders an alert as a small HTML email body — severity-colored
/// header, rule name, source event, matched fields, and tags. Hand-built
/// rather than pulled through a templating crate, matching the same
/// small-dependency preference already applied to playbook-parameter
/// rendering.
fn render_html(alert: &Alert) -> String {
    let matched_fields = serde_json::to_string_pretty(&alert.matched_fields).unwrap_or_default();
    let tags = if alert.tags.is_empty() { "none".to_string() } else { alert.tags.join(", ") };
    format!(
        "<html><body>\
         <div style=\"background:{color};color:#fff;padding:8px 16px;font-family:sans-serif\">\
         <strong>{severity:?}</strong> &mdash; {rule_title}</div>\
         <div style=\"padding:16px;font-family:sans-serif\">\
         <p>{description}</p>\
         <p><strong>Source event:</strong> {source_event_id}</p>\
         <p><strong>Tags:</strong> {tags}</p>\
         <pre>{matched_fields}</pre>\
         </div></body></html>",
        color = severity_color(alert.severity),
        severity = alert.severity,
        rule_title = alert.rule_title,
        description = alert.description,
        source_event_id = alert.source_event_id,
        tags = tags,
        matched_fields = matched_fields,
    )
}

/// Sends alerts as HTML email over SMTP.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: String,
}

impl EmailChannel {
    pub fn new(smtp_host: &str, username: &str, password: &str, from: impl Into<String>, to: impl Into<String>) -> Result<Self, ChannelError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| ChannelError::Permanent(e.to_string()))?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self { transport, from: from.into(), to: to.into() })
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let message = Message::builder()
            .from(self.from.parse().map_err(|e: lettre::address::AddressError| ChannelError::Permanent(e.to_string()))?)
            .to(self.to.parse().map_err(|e: lettre::address::AddressError| ChannelError::Permanent(e.to_string()))?)
            .subject(format!("[{:?}] {}", alert.severity, alert.rule_title))
            .header(ContentType::TEXT_HTML)
            .body(render_html(alert))
            .map_err(|e| ChannelError::Permanent(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| ChannelError::Transient(e.to_string()))?;
        Ok(())
    }
}

/// Posts an alert as a Slack incoming-webhook message.
pub struct SlackChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), webhook_url: webhook_url.into() }
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let payload = json!({
            "attachments": [{
                "color": severity_color(alert.severity),
                "title": format!("[{:?}] {}", alert.severity, alert.rule_title),
                "text": alert.description,
                "fields": [
                    { "title": "Source event", "value": alert.source_event_id.to_string(), "short": true },
                    { "title": "Tags", "value": alert.tags.join(", "), "short": true },
                ],
            }],
        });
        post_webhook(&self.client, &self.webhook_url, &payload).await
    }
}

/// Posts an alert as a Discord incoming-webhook embed.
pub struct DiscordChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordChannel {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), webhook_url: webhook_url.into() }
    }
}

#[async_trait]
impl AlertChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let payload = json!({
            "embeds": [{
                "title": format!("[{:?}] {}", alert.severity, alert.rule_title),
                "description": alert.description,
                "fields": [
                    { "name": "Source event", "value": alert.source_event_id.to_string() },
                    { "name": "Tags", "value": if alert.tags.is_empty() { "none".to_string() } else { alert.tags.join(", ") } },
                ],
            }],
        });
        post_webhook(&self.client, &self.webhook_url, &payload).await
    }
}

/// Posts an alert as a Telegram bot message via the Bot API's
/// `sendMessage` method.
pub struct TelegramChannel {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), bot_token: bot_token.into(), chat_id: chat_id.into() }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let text = format!("[{:?}] {}\n{}\nsource event: {}", alert.severity, alert.rule_title, alert.description, alert.source_event_id);
        let payload = json!({ "chat_id": self.chat_id, "text": text });
        post_webhook(&self.client, &url, &payload).await
    }
}

/// Generic JSON POST of the raw [`Alert`] payload — the catch-all
/// channel for systems with no dedicated integration.
pub struct WebhookChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookChannel {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), webhook_url: webhook_url.into() }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let response = self.client.post(&self.webhook_url).json(alert).send().await.map_err(|e| ChannelError::Transient(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ChannelError::Transient(format!("webhook returned {}", response.status())));
        }
        Ok(())
    }
}

async fn post_webhook(client: &reqwest::Client, url: &str, payload: &serde_json::Value) -> Result<(), ChannelError> {
    let response = client.post(url).json(payload).send().await.map_err(|e| ChannelError::Transient(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ChannelError::Transient(format!("{url} returned {}", response.status())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_alert() -> Alert {
        Alert::raise("rule-1", "Repeated failed logins", Severity::Critical, "5 failures in 1m", Uuid::new_v4(), json!({ "src_ip": "10.0.0.7" }), vec!["auth".into()]).unwrap()
    }

    #[test]
    fn html_email_body_includes_rule_title_and_matched_fields() {
        let alert = sample_alert();
        let html = render_html(&alert);
        assert!(html.contains("Repeated failed logins"));
        assert!(html.contains("10.0.0.7"));
        assert!(html.contains(severity_color(Severity::Critical)));
    }

    #[tokio::test]
    async fn webhook_channel_reports_transient_error_on_connection_failure() {
        let channel = WebhookChannel::new("http://127.0.0.1:1/not-listening");
        let result = channel.send(&sample_alert()).await;
        assert!(matches!(result, Err(ChannelError::Transient(_))));
    }

    #[test]
    fn email_channel_construction_rejects_unresolvable_relay_lazily() {
        // `relay` only validates the hostname shape; unreachable hosts
        // surface as a transient error on `send`, not at construction.
        let channel = EmailChannel::new("smtp.example.com", "user", "pass", "aegis@example.com", "soc@example.com");
        assert!(channel.is_ok());
    }
}
