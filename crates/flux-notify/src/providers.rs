use crate::error::{NotifyError, Result};
use crate::message::{InlineGraph, NotifyMessage};
use crate::notifier::{Notifier, NotifyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// 邮件通知
// ============================================================================

fn default_smtp_port() -> u16 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 使用 TLS 连接（需要认证的中继）
    #[serde(default)]
    pub tls: bool,
    pub from: String,
    pub to: Vec<String>,
}

pub struct EmailNotifier {
    config: EmailConfig,
    mailer: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
    http: reqwest::Client,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, Tokio1Executor};

        if config.to.is_empty() {
            return Err(NotifyError::Address("no recipients configured".to_string()));
        }

        let mut builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        builder = builder.port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            mailer: builder.build(),
            http,
        })
    }

    /// 下载图表；失败的图表直接跳过
    async fn fetch_graph(&self, graph: &InlineGraph) -> Option<(Vec<u8>, String)> {
        let response = match self.http.get(&graph.url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(url = %graph.url, status = %response.status(), "Graph download failed");
                return None;
            }
            Err(e) => {
                debug!(url = %graph.url, error = %e, "Graph download failed");
                return None;
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();

        match response.bytes().await {
            Ok(bytes) => Some((bytes.to_vec(), content_type)),
            Err(e) => {
                debug!(url = %graph.url, error = %e, "Graph download failed");
                None
            }
        }
    }

    async fn build_email(&self, message: &NotifyMessage) -> Result<lettre::Message> {
        use lettre::message::header::ContentType;
        use lettre::message::{Attachment, Mailbox, MultiPart};

        let parse = |raw: &str| {
            raw.parse::<Mailbox>()
                .map_err(|e| NotifyError::Address(format!("{}: {}", raw, e)))
        };

        let mut builder = lettre::Message::builder()
            .from(parse(&self.config.from)?)
            .subject(&message.subject);
        for to in &self.config.to {
            builder = builder.to(parse(to)?);
        }

        let mut related = MultiPart::related().multipart(MultiPart::alternative_plain_html(
            message.text.clone(),
            message.html.clone(),
        ));

        for graph in &message.graphs {
            let Some((body, content_type)) = self.fetch_graph(graph).await else {
                continue;
            };
            let Ok(content_type) = ContentType::parse(&content_type) else {
                continue;
            };
            debug!(content_id = %graph.content_id, url = %graph.url, "Attaching graph");
            related = related.singlepart(
                Attachment::new_inline(graph.content_id.clone()).body(body, content_type),
            );
        }

        builder
            .multipart(related)
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        use lettre::AsyncTransport;

        let email = self.build_email(message).await?;

        match self.mailer.send(email).await {
            Ok(_) => Ok(NotifyResult::success()),
            Err(e) => Ok(NotifyResult::failure(format!("Email send failed: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "email"
    }

    fn recipients(&self) -> String {
        self.config.to.join(",")
    }
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: Option<std::collections::HashMap<String, String>>,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let mut request = self.client.post(&self.config.url);

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(message).send().await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }

    fn recipients(&self) -> String {
        self.config.url.clone()
    }
}
