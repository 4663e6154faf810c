use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use limitcast::error::SourceError;
use limitcast::models::{AccountSnapshot, ApiUsageReport, SnapshotCollection};
use limitcast::monitor::{Command, Monitor};
use limitcast::notify::{DeepLink, Notifier, Transport, TransportConfig, TransportOptions};
use limitcast::source::AccountSource;
use limitcast::storage::SnapshotStore;

/// Serves whatever account list the test last queued
struct ScriptedSource {
    accounts: Mutex<Vec<AccountSnapshot>>,
}

impl ScriptedSource {
    fn set(&self, accounts: Vec<AccountSnapshot>) {
        *self.accounts.lock().unwrap() = accounts;
    }
}

#[async_trait]
impl AccountSource for ScriptedSource {
    async fn fetch_accounts(&self) -> Result<SnapshotCollection, SourceError> {
        Ok(SnapshotCollection::new(self.accounts.lock().unwrap().clone()))
    }

    async fn fetch_api_keys(&self, _time_range: &str) -> Result<ApiUsageReport, SourceError> {
        Ok(ApiUsageReport::default())
    }
}

async fn webhook() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "success" })))
        .mount(&server)
        .await;
    server
}

async fn titles(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["card"]["header"]["title"]["content"]
                .as_str()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn notifies_only_on_state_changes_across_cycles() {
    let hook = webhook().await;
    let dir = tempfile::tempdir().unwrap();

    let source = Arc::new(ScriptedSource {
        accounts: Mutex::new(Vec::new()),
    });
    let transport = Transport::new(
        TransportConfig::Webhook {
            url: format!("{}/hook", hook.uri()),
        },
        TransportOptions::default(),
    );
    let monitor = Monitor::new(
        Notifier::new(transport, None, DeepLink::new("http://localhost:8155", "k")),
        source.clone(),
        SnapshotStore::new(dir.path().join("data/accounts.json")),
    );

    // first run: everything is new
    source.set(vec![
        AccountSnapshot::new("a", "Alpha").limited(10),
        AccountSnapshot::new("b", "Beta"),
    ]);
    assert!(monitor.run(Command::MonitorAccounts, false, None).await.success);
    assert_eq!(titles(&hook).await.len(), 2);

    // A's remaining time moves, B is unchanged
    source.set(vec![
        AccountSnapshot::new("a", "Alpha").limited(15),
        AccountSnapshot::new("b", "Beta"),
    ]);
    monitor.run(Command::MonitorAccounts, false, None).await;
    let sent = titles(&hook).await;
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2], "🔴 Claude rate limited");

    // nothing moved
    monitor.run(Command::MonitorAccounts, false, None).await;
    assert_eq!(titles(&hook).await.len(), 3);

    // A recovers
    source.set(vec![
        AccountSnapshot::new("a", "Alpha"),
        AccountSnapshot::new("b", "Beta"),
    ]);
    monitor.run(Command::MonitorAccounts, false, None).await;
    let sent = titles(&hook).await;
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[3], "🟢 Claude status normal");

    // forced re-notification
    monitor.run(Command::MonitorAccounts, true, None).await;
    assert_eq!(titles(&hook).await.len(), 6);

    let saved = monitor.store().load().unwrap();
    assert!(saved.data.iter().all(|a| !a.is_limited()));
}

#[tokio::test]
async fn corrupt_snapshot_is_treated_as_first_run() {
    let hook = webhook().await;
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("accounts.json");
    std::fs::write(&snapshot, "{ not json").unwrap();

    let notifier = Notifier::new(
        Transport::new(
            TransportConfig::Webhook {
                url: format!("{}/hook", hook.uri()),
            },
            TransportOptions::default(),
        ),
        None,
        DeepLink::new("http://localhost:8155", ""),
    );

    let accounts = vec![AccountSnapshot::new("a", "Alpha")];
    assert!(notifier.send_batch(&accounts, &snapshot, false).await);
    assert_eq!(titles(&hook).await.len(), 1);
}
