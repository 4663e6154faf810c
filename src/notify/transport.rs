use std::time::Duration;

use reqwest::Client;
use tokio::sync::OnceCell;

use super::card::OutboundMessage;
use super::feishu::{check_reply, FeishuApi, DEFAULT_API_BASE};
use crate::error::NotifyError;

/// Delivery credentials. The variant is derived from what is configured,
/// never declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Webhook {
        url: String,
    },
    Application {
        app_id: String,
        app_secret: String,
        chat_id: Option<String>,
    },
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Application,
    Webhook,
    Disabled,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Application => "application",
            TransportMode::Webhook => "webhook",
            TransportMode::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl TransportConfig {
    /// Application credentials win over a webhook; neither means disabled.
    /// Blank strings count as absent.
    pub fn resolve(
        app_id: Option<&str>,
        app_secret: Option<&str>,
        chat_id: Option<&str>,
        webhook_url: Option<&str>,
    ) -> Self {
        if let (Some(app_id), Some(app_secret)) = (present(app_id), present(app_secret)) {
            return TransportConfig::Application {
                app_id,
                app_secret,
                chat_id: present(chat_id),
            };
        }
        match present(webhook_url) {
            Some(url) => TransportConfig::Webhook { url },
            None => TransportConfig::Disabled,
        }
    }

    pub fn mode(&self) -> TransportMode {
        match self {
            TransportConfig::Application { .. } => TransportMode::Application,
            TransportConfig::Webhook { .. } => TransportMode::Webhook,
            TransportConfig::Disabled => TransportMode::Disabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Provider API root for application mode
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Uniform "send structured message" over whichever mode is configured
pub struct Transport {
    config: TransportConfig,
    client: Client,
    api: FeishuApi,
    /// Set once per instance, never re-resolved
    resolved_chat: OnceCell<String>,
}

impl Transport {
    pub fn new(config: TransportConfig, options: TransportOptions) -> Self {
        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        match &config {
            TransportConfig::Disabled => tracing::warn!(
                "Notification transport disabled: neither app credentials nor a webhook url are configured"
            ),
            other => tracing::info!("Notification transport configured: mode={}", other.mode()),
        }

        Self {
            api: FeishuApi::new(client.clone(), options.api_base),
            client,
            config,
            resolved_chat: OnceCell::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(TransportConfig::Disabled, TransportOptions::default())
    }

    pub fn mode(&self) -> TransportMode {
        self.config.mode()
    }

    pub fn supports_callback(&self) -> bool {
        self.mode() == TransportMode::Application
    }

    /// Deliver one message. Failures are logged and reported as `false`;
    /// disabled mode reports success without sending.
    pub async fn send(&self, message: &OutboundMessage) -> bool {
        match self.deliver(message).await {
            Ok(()) => {
                if self.mode() != TransportMode::Disabled {
                    tracing::info!("Notification sent via {}", self.mode());
                }
                true
            }
            Err(e) => {
                tracing::error!("Notification via {} failed: {}", self.mode(), e);
                false
            }
        }
    }

    /// Like `send` but keeps the failure reason
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        match &self.config {
            TransportConfig::Disabled => Ok(()),
            TransportConfig::Webhook { url } => self.send_webhook(url, message).await,
            TransportConfig::Application {
                app_id,
                app_secret,
                chat_id,
            } => {
                let token = self.api.tenant_token(app_id, app_secret).await?;
                let chat = self
                    .chat_for(&token, chat_id.as_deref())
                    .await
                    .ok_or(NotifyError::NoChatTarget)?;
                self.api.send_message(&token, &chat, message).await
            }
        }
    }

    async fn send_webhook(&self, url: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let body = message.webhook_body()?;
        let response = self.client.post(url).json(&body).send().await?;
        check_reply(response).await.map(|_| ())
    }

    /// Chat target for application mode: the configured id, else the first
    /// chat the bot can see. `None` in any other mode or when discovery
    /// fails; failures are not cached.
    pub async fn resolve_chat(&self) -> Option<String> {
        let TransportConfig::Application {
            app_id,
            app_secret,
            chat_id,
        } = &self.config
        else {
            return None;
        };

        if let Some(chat) = self.resolved_chat.get() {
            return Some(chat.clone());
        }
        if chat_id.is_none() {
            match self.api.tenant_token(app_id, app_secret).await {
                Ok(token) => return self.chat_for(&token, None).await,
                Err(e) => {
                    tracing::warn!("Cannot list chats without an access token: {}", e);
                    return None;
                }
            }
        }
        self.chat_for("", chat_id.as_deref()).await
    }

    async fn chat_for(&self, token: &str, configured: Option<&str>) -> Option<String> {
        let result = self
            .resolved_chat
            .get_or_try_init(|| async {
                if let Some(id) = configured {
                    return Ok(id.to_string());
                }
                let chats = self.api.list_chats(token).await?;
                match chats.into_iter().next() {
                    Some(first) => {
                        tracing::info!(
                            "Resolved chat target {} ({})",
                            first.chat_id,
                            first.name
                        );
                        Ok(first.chat_id)
                    }
                    None => Err(NotifyError::NoChatTarget),
                }
            })
            .await;

        match result {
            Ok(chat) => Some(chat.clone()),
            Err(e) => {
                tracing::warn!("No chat target: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::card::{Card, HeaderColor};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(server: &MockServer) -> TransportOptions {
        TransportOptions {
            api_base: server.uri(),
            timeout: Duration::from_secs(5),
        }
    }

    fn app(chat_id: Option<&str>) -> TransportConfig {
        TransportConfig::resolve(Some("cli_x"), Some("secret"), chat_id, None)
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "tenant_access_token": "t-1", "expire": 7200
            })))
            .mount(server)
            .await;
    }

    fn card() -> OutboundMessage {
        Card::new("hello", HeaderColor::Green).into()
    }

    #[test]
    fn test_mode_resolution() {
        let both = TransportConfig::resolve(Some("x"), Some("y"), None, Some("z"));
        assert_eq!(both.mode().as_str(), "application");

        let webhook = TransportConfig::resolve(None, None, None, Some("z"));
        assert_eq!(webhook.mode().as_str(), "webhook");

        let neither = TransportConfig::resolve(None, None, Some("oc_1"), None);
        assert_eq!(neither.mode().as_str(), "disabled");
    }

    #[test]
    fn test_incomplete_app_credentials_fall_through() {
        let only_id = TransportConfig::resolve(Some("x"), None, None, None);
        assert_eq!(only_id, TransportConfig::Disabled);

        let blank_secret = TransportConfig::resolve(Some("x"), Some("  "), None, Some("z"));
        assert_eq!(blank_secret.mode(), TransportMode::Webhook);
    }

    #[tokio::test]
    async fn test_disabled_send_is_successful_noop() {
        let transport = Transport::disabled();
        assert!(transport.send(&card()).await);
        assert_eq!(transport.resolve_chat().await, None);
    }

    #[tokio::test]
    async fn test_webhook_success_requires_zero_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook/ok"))
            .and(body_partial_json(json!({ "msg_type": "interactive" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "success" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook/rejected"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "code": 19021, "msg": "sign match fail" })),
            )
            .mount(&server)
            .await;

        let ok = Transport::new(
            TransportConfig::Webhook { url: format!("{}/hook/ok", server.uri()) },
            options(&server),
        );
        assert!(ok.send(&card()).await);

        let rejected = Transport::new(
            TransportConfig::Webhook { url: format!("{}/hook/rejected", server.uri()) },
            options(&server),
        );
        assert!(!rejected.send(&card()).await);
    }

    #[tokio::test]
    async fn test_webhook_http_error_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = Transport::new(
            TransportConfig::Webhook { url: server.uri() },
            options(&server),
        );
        assert!(!transport.send(&card()).await);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_false() {
        let transport = Transport::new(
            TransportConfig::Webhook { url: "http://127.0.0.1:9/hook".to_string() },
            TransportOptions {
                timeout: Duration::from_millis(500),
                ..TransportOptions::default()
            },
        );
        assert!(!transport.send(&card()).await);
    }

    #[tokio::test]
    async fn test_configured_chat_id_needs_no_lookup() {
        let server = MockServer::start().await;
        let transport = Transport::new(app(Some("oc_fixed")), options(&server));
        assert_eq!(transport.resolve_chat().await.as_deref(), Some("oc_fixed"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_discovered_once_and_cached() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/open-apis/im/v1/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": { "items": [ { "chat_id": "oc_a" }, { "chat_id": "oc_b" } ] }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .and(body_partial_json(json!({ "receive_id": "oc_a", "msg_type": "interactive" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
            .expect(2)
            .mount(&server)
            .await;

        let transport = Transport::new(app(None), options(&server));
        assert!(transport.send(&card()).await);
        assert!(transport.send(&card()).await);
        assert_eq!(transport.resolve_chat().await.as_deref(), Some("oc_a"));
    }

    #[tokio::test]
    async fn test_empty_chat_list_fails_send() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/open-apis/im/v1/chats"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": { "items": [] } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
            .expect(0)
            .mount(&server)
            .await;

        let transport = Transport::new(app(None), options(&server));
        let err = transport.deliver(&card()).await.unwrap_err();
        assert!(matches!(err, NotifyError::NoChatTarget));
        assert!(!transport.send(&card()).await);
        assert_eq!(transport.resolve_chat().await, None);
    }
}
