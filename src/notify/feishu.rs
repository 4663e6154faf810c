use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::card::OutboundMessage;
use crate::error::NotifyError;

pub const DEFAULT_API_BASE: &str = "https://open.feishu.cn";

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const CHATS_PATH: &str = "/open-apis/im/v1/chats";
const MESSAGES_PATH: &str = "/open-apis/im/v1/messages";

/// Application-credential calls against the messaging provider
#[derive(Debug, Clone)]
pub struct FeishuApi {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    tenant_access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatListData {
    #[serde(default)]
    items: Vec<ChatItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatItem {
    pub chat_id: String,
    #[serde(default)]
    pub name: String,
}

impl FeishuApi {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn tenant_token(&self, app_id: &str, app_secret: &str) -> Result<String, NotifyError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, TOKEN_PATH))
            .json(&json!({ "app_id": app_id, "app_secret": app_secret }))
            .send()
            .await?;

        let body = check_reply(response).await?;
        let reply: TokenReply = serde_json::from_value(body)?;
        reply
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NotifyError::Response("tenant_access_token missing".to_string()))
    }

    /// Chats the application bot is a member of, in provider order
    pub async fn list_chats(&self, token: &str) -> Result<Vec<ChatItem>, NotifyError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, CHATS_PATH))
            .bearer_auth(token)
            .query(&[("page_size", "20")])
            .send()
            .await?;

        let body = check_reply(response).await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        if data.is_null() {
            return Ok(Vec::new());
        }
        let data: ChatListData = serde_json::from_value(data)?;
        Ok(data.items)
    }

    pub async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), NotifyError> {
        let body = json!({
            "receive_id": chat_id,
            "msg_type": message.msg_type(),
            "content": message.app_content()?,
        });

        let response = self
            .client
            .post(format!("{}{}", self.base_url, MESSAGES_PATH))
            .bearer_auth(token)
            .query(&[("receive_id_type", "chat_id")])
            .json(&body)
            .send()
            .await?;

        check_reply(response).await.map(|_| ())
    }
}

/// Two-level success check shared by every provider call: transport-level
/// 2xx, then an embedded status code equal to 0.
pub(crate) async fn check_reply(response: Response) -> Result<Value, NotifyError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(NotifyError::Status {
            status: status.as_u16(),
            body: truncate(&text, 300),
        });
    }

    let body: Value =
        serde_json::from_str(&text).map_err(|_| NotifyError::Response(truncate(&text, 300)))?;

    // group bot webhooks used `StatusCode` before switching to `code`
    let code = body
        .get("code")
        .or_else(|| body.get("StatusCode"))
        .and_then(Value::as_i64);

    match code {
        Some(0) => Ok(body),
        Some(code) => Err(NotifyError::Provider {
            code,
            msg: body
                .get("msg")
                .or_else(|| body.get("StatusMessage"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        None => Err(NotifyError::Response(truncate(&text, 300))),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
