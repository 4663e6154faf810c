use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::MonitorError;
use crate::models::SnapshotCollection;
use crate::notify::Notifier;
use crate::source::AccountSource;
use crate::storage::SnapshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MonitorAccounts,
    MonitorApiUsage,
    FullMonitor,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::MonitorAccounts => "monitor_accounts",
            Command::MonitorApiUsage => "monitor_api_usage",
            Command::FullMonitor => "full_monitor",
        }
    }
}

impl FromStr for Command {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monitor_accounts" => Ok(Command::MonitorAccounts),
            "monitor_api_usage" => Ok(Command::MonitorApiUsage),
            "full_monitor" => Ok(Command::FullMonitor),
            _ => Err(MonitorError::UnsupportedCommand(s.to_string())),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one command, returned as-is by the HTTP endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Local>,
}

impl CommandOutcome {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            timestamp: Local::now(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            timestamp: Local::now(),
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Runs monitoring cycles: fetch, compare, notify, persist.
///
/// Cycles are serialized so the snapshot file is never read and written by
/// two cycles at once.
pub struct Monitor {
    notifier: Notifier,
    source: Arc<dyn AccountSource>,
    store: SnapshotStore,
    time_range: String,
    cycle: Mutex<()>,
}

impl Monitor {
    pub fn new(notifier: Notifier, source: Arc<dyn AccountSource>, store: SnapshotStore) -> Self {
        Self {
            notifier,
            source,
            store,
            time_range: "today".to_string(),
            cycle: Mutex::new(()),
        }
    }

    pub fn with_time_range(mut self, time_range: impl Into<String>) -> Self {
        self.time_range = time_range.into();
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// `time_range` overrides the configured usage range for this run only
    pub async fn run(
        &self,
        command: Command,
        force_notify: bool,
        time_range: Option<&str>,
    ) -> CommandOutcome {
        tracing::info!("Running {} (force_notify={})", command, force_notify);
        match command {
            Command::MonitorAccounts => self.monitor_accounts(force_notify).await,
            Command::MonitorApiUsage => self.monitor_api_usage(time_range).await,
            Command::FullMonitor => self.full_monitor(force_notify, time_range).await,
        }
    }

    /// Parse and run a command by name
    pub async fn run_named(
        &self,
        name: &str,
        force_notify: bool,
        time_range: Option<&str>,
    ) -> Result<CommandOutcome, MonitorError> {
        let command: Command = name.parse()?;
        Ok(self.run(command, force_notify, time_range).await)
    }

    pub async fn monitor_accounts(&self, force_notify: bool) -> CommandOutcome {
        let _cycle = self.cycle.lock().await;

        let collection = match self.source.fetch_accounts().await {
            Ok(collection) => collection,
            Err(e) => return self.fail(format!("Failed to fetch account data: {}", e)).await,
        };
        if !collection.success || collection.data.is_empty() {
            return self.fail("Account data is empty or marked unsuccessful").await;
        }

        let report = self
            .notifier
            .dispatch_changes(&collection.data, &self.store, force_notify)
            .await;

        let snapshot = SnapshotCollection::new(collection.data);
        let data = json!({
            "accounts": snapshot.data.len(),
            "limited": snapshot.data.iter().filter(|a| a.is_limited()).count(),
            "notifications": report,
        });

        if let Err(e) = self.store.save(&snapshot) {
            tracing::error!("Failed to save snapshot: {}", e);
            return CommandOutcome::failure(format!("Snapshot could not be saved: {}", e))
                .with_data(data);
        }

        let status = if report.succeeded() { "sent" } else { "failed" };
        CommandOutcome::ok(
            format!(
                "Account monitoring finished, notifications {} ({}/{})",
                status, report.delivered, report.attempted
            ),
            data,
        )
    }

    pub async fn monitor_api_usage(&self, time_range: Option<&str>) -> CommandOutcome {
        let time_range = time_range
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.time_range.as_str());

        let report = match self.source.fetch_api_keys(time_range).await {
            Ok(report) => report,
            Err(e) => return self.fail(format!("Failed to fetch API usage data: {}", e)).await,
        };

        let keys = report.data.len();
        if self.notifier.send_api_usage_notification(&report).await {
            CommandOutcome::ok(
                "API usage monitoring finished",
                json!({ "keys": keys, "timeRange": time_range }),
            )
        } else {
            CommandOutcome::failure("API usage notification failed")
        }
    }

    pub async fn full_monitor(
        &self,
        force_notify: bool,
        time_range: Option<&str>,
    ) -> CommandOutcome {
        let accounts = self.monitor_accounts(force_notify).await;
        let usage = self.monitor_api_usage(time_range).await;

        let message = format!(
            "Accounts {} | API usage {}",
            if accounts.success { "ok" } else { "failed" },
            if usage.success { "ok" } else { "failed" },
        );
        CommandOutcome {
            success: accounts.success && usage.success,
            message,
            data: Some(json!({ "accounts": accounts, "apiUsage": usage })),
            timestamp: Local::now(),
        }
    }

    async fn fail(&self, message: impl Into<String>) -> CommandOutcome {
        let message = message.into();
        tracing::error!("{}", message);
        self.notifier.send_error_notification(&message).await;
        CommandOutcome::failure(message)
    }
}
