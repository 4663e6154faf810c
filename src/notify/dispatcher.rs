use std::path::Path;

use chrono::Local;
use serde::Serialize;

use super::buttons::{build_buttons, ButtonConfig, DeepLink};
use super::card::{error_card, rate_limit_card, usage_card, Button, OutboundMessage};
use super::transport::{Transport, TransportMode};
use crate::config::AppConfig;
use crate::models::{AccountSnapshot, ApiUsageReport, UsageStats};
use crate::monitor::detector::detect_all;
use crate::storage::SnapshotStore;

/// Counts from one batch dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub checked: usize,
    pub attempted: usize,
    pub delivered: usize,
}

impl BatchReport {
    /// Zero attempts is not a failure
    pub fn succeeded(&self) -> bool {
        self.attempted == 0 || self.delivered > 0
    }
}

/// Composes notification messages and hands them to the transport
pub struct Notifier {
    transport: Transport,
    buttons: Option<ButtonConfig>,
    deep_link: DeepLink,
}

impl Notifier {
    pub fn new(transport: Transport, buttons: Option<ButtonConfig>, deep_link: DeepLink) -> Self {
        Self {
            transport,
            buttons,
            deep_link,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Transport::new(config.transport_config(), config.transport_options()),
            config.notification.feishu.buttons.clone(),
            config.deep_link(),
        )
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn mode(&self) -> TransportMode {
        self.transport.mode()
    }

    pub fn button_actions(&self) -> Vec<Button> {
        build_buttons(self.buttons.as_ref(), self.mode(), &self.deep_link)
    }

    pub async fn send(&self, message: &OutboundMessage) -> bool {
        self.transport.send(message).await
    }

    pub async fn send_rate_limit_notification(&self, account: &AccountSnapshot) -> bool {
        let card = rate_limit_card(account, self.button_actions(), Local::now());
        self.send(&card.into()).await
    }

    /// Notify every account whose state differs from the snapshot stored
    /// at `previous_path`. Does not write the snapshot.
    pub async fn send_batch(
        &self,
        accounts: &[AccountSnapshot],
        previous_path: &Path,
        force_notify: bool,
    ) -> bool {
        let store = SnapshotStore::new(previous_path);
        self.dispatch_changes(accounts, &store, force_notify)
            .await
            .succeeded()
    }

    pub async fn dispatch_changes(
        &self,
        accounts: &[AccountSnapshot],
        store: &SnapshotStore,
        force_notify: bool,
    ) -> BatchReport {
        let previous = store.load_previous();
        let changes = detect_all(accounts, &previous, force_notify);

        let mut report = BatchReport {
            checked: accounts.len(),
            ..Default::default()
        };

        for (account, change) in accounts.iter().zip(&changes) {
            if !change.changed {
                tracing::info!(
                    "Account {} unchanged ({}), skipping notification",
                    account.id,
                    if account.is_limited() { "limited" } else { "normal" }
                );
                continue;
            }

            report.attempted += 1;
            if self.send_rate_limit_notification(account).await {
                report.delivered += 1;
            } else {
                tracing::warn!(
                    "Notification for account {} ({}) failed",
                    account.id,
                    change.reason
                );
            }
        }

        tracing::info!(
            "Batch notification: checked={} attempted={} delivered={}",
            report.checked,
            report.attempted,
            report.delivered
        );
        report
    }

    pub async fn send_error_notification(&self, message: &str) -> bool {
        let card = error_card(message, Local::now());
        self.send(&card.into()).await
    }

    /// Usage summary across API keys. A failed or empty report becomes an
    /// error notification instead.
    pub async fn send_api_usage_notification(&self, report: &ApiUsageReport) -> bool {
        if !report.success {
            return self
                .send_error_notification("API usage data could not be fetched")
                .await;
        }
        if report.data.is_empty() {
            return self.send_error_notification("No API key data found").await;
        }

        let stats = UsageStats::from_keys(&report.data);
        let card = usage_card(&stats, Local::now());
        self.send(&card.into()).await
    }
}
