use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::usage::{UsageBucket, UsageRecord};

/// Rate limit state of one account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimit {
    pub is_limited: bool,
    pub limited_at: Option<DateTime<Utc>>,
    /// Always 0 when `is_limited` is false
    pub minutes_remaining: u32,
}

/// Today's counters for one account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
    pub session_cost: Option<f64>,
}

/// One account's observed state at a point in time.
///
/// Decoded once from the account API's wire shape (`rateLimitStatus`,
/// `usage.today` / `usage.daily`) so the rest of the crate never has to
/// re-derive defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AccountRecord", into = "AccountRecord")]
pub struct AccountSnapshot {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub rate_limit: RateLimit,
    pub usage: Usage,
}

impl AccountSnapshot {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            rate_limit: RateLimit::default(),
            usage: Usage::default(),
        }
    }

    pub fn limited(mut self, minutes_remaining: u32) -> Self {
        self.rate_limit = RateLimit {
            is_limited: true,
            limited_at: Some(Utc::now()),
            minutes_remaining,
        };
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn is_limited(&self) -> bool {
        self.rate_limit.is_limited
    }
}

/// Ordered set of account states captured together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCollection {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<AccountSnapshot>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SnapshotCollection {
    pub fn new(data: Vec<AccountSnapshot>) -> Self {
        Self {
            success: true,
            data,
            fetched_at: Some(Utc::now()),
        }
    }
}

// Wire shape of an account entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    id: String,
    #[serde(default = "unknown_name")]
    name: String,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    rate_limit_status: RateLimitRecord,
    #[serde(default)]
    usage: UsageRecord,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitRecord {
    #[serde(default)]
    is_rate_limited: bool,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    rate_limited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    minutes_remaining: i64,
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

/// Empty, unparseable or non-string timestamps decode as `None` instead of
/// failing the whole document.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

impl From<AccountRecord> for AccountSnapshot {
    fn from(record: AccountRecord) -> Self {
        let status = record.rate_limit_status;
        let minutes_remaining = if status.is_rate_limited {
            status.minutes_remaining.clamp(0, u32::MAX as i64) as u32
        } else {
            0
        };

        let bucket = record.usage.current_bucket();

        Self {
            id: record.id,
            name: record.name,
            active: record.is_active,
            rate_limit: RateLimit {
                is_limited: status.is_rate_limited,
                limited_at: status.rate_limited_at,
                minutes_remaining,
            },
            usage: Usage {
                requests: bucket.requests,
                tokens: bucket.all_tokens,
                cost: bucket.cost.max(0.0),
                session_cost: record.usage.session_cost.map(|c| c.max(0.0)),
            },
        }
    }
}

impl From<AccountSnapshot> for AccountRecord {
    fn from(snapshot: AccountSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            is_active: snapshot.active,
            rate_limit_status: RateLimitRecord {
                is_rate_limited: snapshot.rate_limit.is_limited,
                rate_limited_at: snapshot.rate_limit.limited_at,
                minutes_remaining: snapshot.rate_limit.minutes_remaining as i64,
            },
            usage: UsageRecord {
                today: Some(UsageBucket {
                    requests: snapshot.usage.requests,
                    all_tokens: snapshot.usage.tokens,
                    cost: snapshot.usage.cost,
                    formatted_cost: None,
                }),
                daily: None,
                session_cost: snapshot.usage.session_cost,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_wire_account() {
        let account: AccountSnapshot = serde_json::from_value(json!({
            "id": "acc-1",
            "name": "Claude Pro",
            "isActive": true,
            "rateLimitStatus": {
                "isRateLimited": true,
                "rateLimitedAt": "2025-01-01T08:00:00.000Z",
                "minutesRemaining": 15
            },
            "usage": { "daily": { "requests": 100, "allTokens": 50000 } }
        }))
        .unwrap();

        assert_eq!(account.id, "acc-1");
        assert!(account.active);
        assert!(account.rate_limit.is_limited);
        assert_eq!(account.rate_limit.minutes_remaining, 15);
        assert!(account.rate_limit.limited_at.is_some());
        assert_eq!(account.usage.requests, 100);
        assert_eq!(account.usage.tokens, 50000);
        assert_eq!(account.usage.session_cost, None);
    }

    #[test]
    fn test_minutes_ignored_when_not_limited() {
        let account: AccountSnapshot = serde_json::from_value(json!({
            "id": "acc-2",
            "rateLimitStatus": { "isRateLimited": false, "minutesRemaining": 42 }
        }))
        .unwrap();
        assert_eq!(account.rate_limit.minutes_remaining, 0);
        assert_eq!(account.name, "Unknown");
    }

    #[test]
    fn test_blank_timestamp_is_none() {
        let account: AccountSnapshot = serde_json::from_value(json!({
            "id": "acc-3",
            "rateLimitStatus": { "isRateLimited": true, "rateLimitedAt": "", "minutesRemaining": -5 }
        }))
        .unwrap();
        assert_eq!(account.rate_limit.limited_at, None);
        assert_eq!(account.rate_limit.minutes_remaining, 0);
    }

    #[test]
    fn test_non_string_timestamp_does_not_fail_collection() {
        let collection: SnapshotCollection = serde_json::from_value(json!({
            "success": true,
            "fetchedAt": 1735718400,
            "data": [{
                "id": "acc-5",
                "rateLimitStatus": {
                    "isRateLimited": true,
                    "rateLimitedAt": 1735718400000u64,
                    "minutesRemaining": 20
                }
            }]
        }))
        .unwrap();
        assert_eq!(collection.fetched_at, None);
        assert_eq!(collection.data[0].rate_limit.limited_at, None);
        assert_eq!(collection.data[0].rate_limit.minutes_remaining, 20);
    }

    #[test]
    fn test_saved_form_decodes_to_same_snapshot() {
        let original = AccountSnapshot::new("acc-4", "Team").limited(30).with_usage(Usage {
            requests: 7,
            tokens: 700,
            cost: 1.25,
            session_cost: Some(0.5),
        });
        let value = serde_json::to_value(&original).unwrap();
        assert_eq!(value["rateLimitStatus"]["minutesRemaining"], 30);
        assert_eq!(value["usage"]["sessionCost"], 0.5);

        let decoded: AccountSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_collection_without_fetched_at() {
        let collection: SnapshotCollection =
            serde_json::from_value(json!({ "success": true, "data": [{ "id": "a" }] })).unwrap();
        assert!(collection.success);
        assert_eq!(collection.data.len(), 1);
        assert_eq!(collection.fetched_at, None);
    }
}
