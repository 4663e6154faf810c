use serde::Deserialize;

use super::card::Button;
use super::transport::TransportMode;

/// How card buttons re-trigger monitoring commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Deep link into `/trigger/{command}`
    #[default]
    Url,
    /// Value replayed by the provider to the callback endpoint
    Callback,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UrlAction {
    pub text: String,
    pub command: String,
    #[serde(default = "default_style")]
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackAction {
    pub text: String,
    pub value: String,
    #[serde(default = "default_style")]
    pub style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ButtonConfig {
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub url_actions: Vec<UrlAction>,
    #[serde(default)]
    pub callback_actions: Vec<CallbackAction>,
}

fn default_style() -> String {
    "default".to_string()
}

/// Externally reachable trigger endpoint used by `url` buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    base_url: String,
    access_key: String,
}

impl DeepLink {
    pub fn new(base_url: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_key: access_key.into(),
        }
    }

    pub fn trigger_url(&self, command: &str) -> String {
        format!("{}/trigger/{}?k={}", self.base_url, command, self.access_key)
    }
}

const DEFAULT_ACTIONS: [(&str, &str, &str); 2] = [
    ("Check accounts status", "monitor_accounts", "default"),
    ("Check API usage", "monitor_api_usage", "primary"),
];

/// Build the action row for a card.
///
/// `callback` style needs application credentials; under any other mode
/// it falls back to `url` style with a warning.
pub fn build_buttons(
    config: Option<&ButtonConfig>,
    mode: TransportMode,
    link: &DeepLink,
) -> Vec<Button> {
    let Some(config) = config else {
        return default_buttons(link);
    };

    if config.action_type == ActionType::Callback {
        if mode == TransportMode::Application {
            if config.callback_actions.is_empty() {
                return default_buttons(link);
            }
            return config
                .callback_actions
                .iter()
                .map(|a| Button::callback(&a.text, &a.style, &a.value))
                .collect();
        }
        tracing::warn!(
            "Callback buttons require application credentials (mode: {}), falling back to url buttons",
            mode
        );
    }

    if config.url_actions.is_empty() {
        return default_buttons(link);
    }

    config
        .url_actions
        .iter()
        .map(|a| Button::link(&a.text, &a.style, link.trigger_url(&a.command)))
        .collect()
}

fn default_buttons(link: &DeepLink) -> Vec<Button> {
    DEFAULT_ACTIONS
        .iter()
        .map(|(label, command, style)| Button::link(label, style, link.trigger_url(command)))
        .collect()
}
