use chrono::{DateTime, Duration, Local};
use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{AccountSnapshot, UsageStats};

/// Text node, tagged the way the messaging provider expects
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Text {
    PlainText { content: String },
    LarkMd { content: String },
}

impl Text {
    pub fn plain(content: impl Into<String>) -> Self {
        Text::PlainText {
            content: content.into(),
        }
    }

    pub fn md(content: impl Into<String>) -> Self {
        Text::LarkMd {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Text::PlainText { content } | Text::LarkMd { content } => content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub is_short: bool,
    pub text: Text,
}

impl Field {
    /// Short labeled metric: bold label, value on the next line
    pub fn metric(label: &str, value: impl std::fmt::Display) -> Self {
        Self {
            is_short: true,
            text: Text::md(format!("**{}**\n{}", label, value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename = "button")]
pub struct Button {
    pub text: Text,
    #[serde(rename = "type")]
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Button {
    pub fn link(label: &str, style: &str, url: String) -> Self {
        Self {
            text: Text::plain(label),
            style: style.to_string(),
            url: Some(url),
            value: None,
        }
    }

    /// Button whose value the provider replays to the callback endpoint
    pub fn callback(label: &str, style: &str, command: &str) -> Self {
        Self {
            text: Text::plain(label),
            style: style.to_string(),
            url: None,
            value: Some(json!({ "command": command })),
        }
    }

    pub fn command(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(|v| v.get("command"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Element {
    Div {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<Text>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<Field>,
    },
    Hr,
    Action {
        actions: Vec<Button>,
    },
}

impl Element {
    pub fn markdown(content: impl Into<String>) -> Self {
        Element::Div {
            text: Some(Text::md(content)),
            fields: Vec::new(),
        }
    }

    pub fn fields(fields: Vec<Field>) -> Self {
        Element::Div { text: None, fields }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderColor {
    Red,
    Green,
    Blue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardHeader {
    pub title: Text,
    pub template: HeaderColor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardConfig {
    pub wide_screen_mode: bool,
}

/// Interactive card message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub config: CardConfig,
    pub header: CardHeader,
    pub elements: Vec<Element>,
}

impl Card {
    pub fn new(title: impl Into<String>, color: HeaderColor) -> Self {
        Self {
            config: CardConfig {
                wide_screen_mode: true,
            },
            header: CardHeader {
                title: Text::plain(title),
                template: color,
            },
            elements: Vec::new(),
        }
    }

    pub fn push(&mut self, element: Element) -> &mut Self {
        self.elements.push(element);
        self
    }

    pub fn title(&self) -> &str {
        self.header.title.content()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.elements.iter().flat_map(|e| match e {
            Element::Action { actions } => actions.as_slice(),
            _ => &[][..],
        })
    }
}

/// What gets handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Card(Card),
    Text(String),
}

impl OutboundMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            OutboundMessage::Card(_) => "interactive",
            OutboundMessage::Text(_) => "text",
        }
    }

    /// Body posted to a group bot webhook
    pub fn webhook_body(&self) -> Result<Value, serde_json::Error> {
        Ok(match self {
            OutboundMessage::Card(card) => json!({
                "msg_type": self.msg_type(),
                "card": serde_json::to_value(card)?,
            }),
            OutboundMessage::Text(text) => json!({
                "msg_type": self.msg_type(),
                "content": { "text": text },
            }),
        })
    }

    /// `content` string for the application messaging call
    pub fn app_content(&self) -> Result<String, serde_json::Error> {
        match self {
            OutboundMessage::Card(card) => serde_json::to_string(card),
            OutboundMessage::Text(text) => serde_json::to_string(&json!({ "text": text })),
        }
    }
}

impl From<Card> for OutboundMessage {
    fn from(card: Card) -> Self {
        OutboundMessage::Card(card)
    }
}

/// `1234567` -> `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn rate_limit_card(account: &AccountSnapshot, buttons: Vec<Button>, now: DateTime<Local>) -> Card {
    let limited = account.is_limited();
    let (title, status, color) = if limited {
        ("🔴 Claude rate limited", "Rate limited", HeaderColor::Red)
    } else {
        ("🟢 Claude status normal", "Normal", HeaderColor::Green)
    };

    let mut card = Card::new(title, color);
    card.push(Element::fields(vec![
        Field::metric("Account", &account.name),
        Field::metric("Status", status),
    ]))
    .push(Element::Hr)
    .push(Element::markdown("📊 Usage today"));

    let usage = &account.usage;
    let mut metrics = vec![
        Field::metric("Requests", thousands(usage.requests)),
        Field::metric("Tokens", thousands(usage.tokens)),
        Field::metric("Cost", format!("${:.2}", usage.cost)),
    ];
    if let Some(session_cost) = usage.session_cost {
        metrics.push(Field::metric("Session cost", format!("${:.2}", session_cost)));
    }
    card.push(Element::fields(metrics));

    if !buttons.is_empty() {
        card.push(Element::Hr).push(Element::Action { actions: buttons });
    }

    if limited {
        let minutes = account.rate_limit.minutes_remaining;
        let resume_at = now + Duration::minutes(i64::from(minutes));
        card.push(Element::Hr)
            .push(Element::markdown("⚠️ Rate limit warning"))
            .push(Element::markdown(format!(
                "**Time until recovery**: {} minutes",
                minutes
            )))
            .push(Element::markdown(format!(
                "**Expected recovery**: {}",
                resume_at.format("%Y/%m/%d %H:%M")
            )));
    }

    card
}

pub fn error_card(message: &str, now: DateTime<Local>) -> Card {
    let mut card = Card::new("❌ Claude monitor error", HeaderColor::Red);
    card.push(Element::markdown("### 🚨 Error details"))
        .push(Element::markdown(format!(
            "**Message**\n```\n{}\n```",
            message
        )))
        .push(Element::Hr)
        .push(Element::markdown(format!(
            "**Occurred at**\n{}",
            now.format("%Y-%m-%d %H:%M:%S")
        )))
        .push(Element::markdown(
            "**Suggested actions**\n- Check network connectivity\n- Verify API credentials\n- Inspect the service logs\n- Contact the maintainer",
        ));
    card
}

pub fn usage_card(stats: &UsageStats, now: DateTime<Local>) -> Card {
    let mut card = Card::new("📊 Claude API usage", HeaderColor::Blue);
    card.push(Element::markdown("📈 **Today at a glance**"))
        .push(Element::fields(vec![
            Field::metric("Total requests", thousands(stats.total_requests)),
            Field::metric("Total tokens", thousands(stats.total_tokens)),
            Field::metric("Total cost", format!("${:.2}", stats.total_cost)),
            Field::metric(
                "Active keys",
                format!("{}/{}", stats.active_keys, stats.key_count),
            ),
        ]))
        .push(Element::Hr);

    if !stats.cost_breakdown.is_empty() {
        card.push(Element::markdown("💰 **Cost breakdown** (Top 5)"));
        for (i, share) in stats.cost_breakdown.iter().take(5).enumerate() {
            card.push(Element::markdown(format!(
                "**{}. {}**\n{} ({:.1}%)",
                i + 1,
                share.name,
                share.formatted_cost,
                share.percentage
            )));
        }
    }

    if !stats.request_breakdown.is_empty() {
        card.push(Element::Hr)
            .push(Element::markdown("🔑 **Usage breakdown** (Top 5)"));
        for (i, share) in stats.request_breakdown.iter().take(5).enumerate() {
            card.push(Element::markdown(format!(
                "**{}. {}**\nRequests: {} ({:.1}%) | Tokens: {}",
                i + 1,
                share.name,
                thousands(share.count),
                share.percentage,
                thousands(stats.tokens_for(&share.name))
            )));
        }
    }

    card.push(Element::Hr).push(Element::markdown(format!(
        "**Updated**: {}",
        now.format("%Y-%m-%d %H:%M:%S")
    )));
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Usage;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
    }

    fn all_text(card: &Card) -> String {
        serde_json::to_string(card).unwrap()
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_card_serializes_provider_tags() {
        let mut card = Card::new("title", HeaderColor::Green);
        card.push(Element::Hr)
            .push(Element::markdown("hello"))
            .push(Element::Action {
                actions: vec![Button::callback("Go", "primary", "monitor_accounts")],
            });

        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["config"]["wide_screen_mode"], true);
        assert_eq!(value["header"]["title"]["tag"], "plain_text");
        assert_eq!(value["header"]["template"], "green");
        assert_eq!(value["elements"][0], json!({ "tag": "hr" }));
        assert_eq!(value["elements"][1]["tag"], "div");
        assert_eq!(value["elements"][1]["text"]["tag"], "lark_md");
        assert!(value["elements"][1].get("fields").is_none());
        let button = &value["elements"][2]["actions"][0];
        assert_eq!(button["tag"], "button");
        assert_eq!(button["type"], "primary");
        assert_eq!(button["value"]["command"], "monitor_accounts");
        assert!(button.get("url").is_none());
    }

    #[test]
    fn test_limited_card_has_warning_and_resume_time() {
        let account = AccountSnapshot::new("a", "Claude Pro")
            .limited(15)
            .with_usage(Usage {
                requests: 1500,
                tokens: 75000,
                cost: 2.5,
                session_cost: Some(0.75),
            });
        let card = rate_limit_card(&account, Vec::new(), fixed_now());
        let text = all_text(&card);

        assert_eq!(card.header.template, HeaderColor::Red);
        assert!(text.contains("Claude Pro"));
        assert!(text.contains("1,500"));
        assert!(text.contains("75,000"));
        assert!(text.contains("$2.50"));
        assert!(text.contains("Session cost"));
        assert!(text.contains("15 minutes"));
        assert!(text.contains("2025/03/01 10:15"));
        assert_eq!(card.buttons().count(), 0);
    }

    #[test]
    fn test_normal_card_has_no_warning() {
        let account = AccountSnapshot::new("a", "Claude Pro");
        let card = rate_limit_card(
            &account,
            vec![Button::link("Open", "default", "http://x/trigger/y?k=z".into())],
            fixed_now(),
        );
        let text = all_text(&card);

        assert_eq!(card.header.template, HeaderColor::Green);
        assert!(!text.contains("Rate limit warning"));
        assert!(!text.contains("Session cost"));
        assert_eq!(card.buttons().count(), 1);
    }

    #[test]
    fn test_error_card_embeds_message() {
        let card = error_card("connection timed out", fixed_now());
        let text = all_text(&card);
        assert!(text.contains("connection timed out"));
        assert!(text.contains("2025-03-01 10:00:00"));
        assert_eq!(card.header.template, HeaderColor::Red);
    }

    #[test]
    fn test_message_bodies() {
        let text = OutboundMessage::Text("ping".into());
        assert_eq!(
            text.webhook_body().unwrap(),
            json!({ "msg_type": "text", "content": { "text": "ping" } })
        );
        assert_eq!(text.app_content().unwrap(), r#"{"text":"ping"}"#);

        let card: OutboundMessage = Card::new("t", HeaderColor::Blue).into();
        let body = card.webhook_body().unwrap();
        assert_eq!(body["msg_type"], "interactive");
        assert_eq!(body["card"]["header"]["template"], "blue");
        let content: Value = serde_json::from_str(&card.app_content().unwrap()).unwrap();
        assert_eq!(content["header"]["title"]["content"], "t");
    }
}
