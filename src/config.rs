use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::notify::buttons::{ButtonConfig, DeepLink};
use crate::notify::feishu::DEFAULT_API_BASE;
use crate::notify::transport::{TransportConfig, TransportOptions};

pub const CONFIG_ENV: &str = "LIMITCAST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub notification: NotificationConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub claude: AccountsEndpoint,
    pub usage: UsageEndpoint,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            claude: AccountsEndpoint::default(),
            usage: UsageEndpoint::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountsEndpoint {
    pub bearer_token: Option<String>,
    pub endpoint: String,
    /// Seconds
    pub timeout: u64,
}

impl Default for AccountsEndpoint {
    fn default() -> Self {
        Self {
            bearer_token: None,
            endpoint: "/admin/claude-accounts".to_string(),
            timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsageEndpoint {
    pub endpoint: String,
    pub timeout: u64,
    pub time_range: String,
}

impl Default for UsageEndpoint {
    fn default() -> Self {
        Self {
            endpoint: "/admin/api-keys".to_string(),
            timeout: 30,
            time_range: "today".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub feishu: FeishuConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feishu: FeishuConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeishuConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub chat_id: Option<String>,
    pub encrypt_key: Option<String>,
    pub verification_token: Option<String>,
    pub api_base: String,
    pub timeout: u64,
    pub buttons: Option<ButtonConfig>,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            app_id: None,
            app_secret: None,
            chat_id: None,
            encrypt_key: None,
            verification_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: 10,
            buttons: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base for trigger links, when it differs from
    /// `http://{host}:{port}`
    pub public_url: Option<String>,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8155,
            public_url: None,
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer key for `POST /command`
    pub api_key: Option<String>,
    /// `k` query parameter for `GET /trigger/:command`
    pub simple_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: PathBuf,
    pub log_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/claude_accounts.json"),
            log_dir: None,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl AppConfig {
    /// Load from `LIMITCAST_CONFIG`, or `config.yaml` in the working directory
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Format is chosen by extension: `.yaml`/`.yml` or `.toml`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let yaml = match extension.as_deref() {
            Some("yaml") | Some("yml") => true,
            Some("toml") => false,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: AppConfig = if yaml {
            serde_yaml::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn transport_config(&self) -> TransportConfig {
        let feishu = &self.notification.feishu;
        if !self.notification.enabled || !feishu.enabled {
            tracing::info!("Notifications turned off in config");
            return TransportConfig::Disabled;
        }
        TransportConfig::resolve(
            non_blank(&feishu.app_id),
            non_blank(&feishu.app_secret),
            non_blank(&feishu.chat_id),
            non_blank(&feishu.webhook_url),
        )
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            api_base: self.notification.feishu.api_base.clone(),
            timeout: Duration::from_secs(self.notification.feishu.timeout),
        }
    }

    pub fn deep_link(&self) -> DeepLink {
        let base = non_blank(&self.server.public_url)
            .map(str::to_string)
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port));
        DeepLink::new(
            base,
            non_blank(&self.server.auth.simple_key).unwrap_or_default(),
        )
    }

    pub fn log_dir(&self) -> PathBuf {
        self.storage.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("limitcast")
                .join("logs")
        })
    }
}
