use serde::{Deserialize, Serialize};

/// One usage bucket (`today` or `daily`) as reported by the account API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBucket {
    #[serde(default)]
    pub requests: u64,
    #[serde(default)]
    pub all_tokens: u64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_cost: Option<String>,
}

impl UsageBucket {
    pub fn is_idle(&self) -> bool {
        self.requests == 0 && self.all_tokens == 0 && self.cost <= 0.0
    }

    pub fn display_cost(&self) -> String {
        self.formatted_cost
            .clone()
            .unwrap_or_else(|| format!("${:.2}", self.cost))
    }
}

/// Raw `usage` object. Either bucket may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<UsageBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<UsageBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cost: Option<f64>,
}

impl UsageRecord {
    /// `today` when present and non-empty, else `daily`, else an empty bucket.
    ///
    /// Every reader of usage data goes through here so account cards and
    /// API usage reports agree on which bucket counts.
    pub fn current_bucket(&self) -> UsageBucket {
        self.today
            .as_ref()
            .filter(|bucket| !bucket.is_idle())
            .or(self.daily.as_ref())
            .cloned()
            .unwrap_or_default()
    }
}

/// One API key entry from the usage endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyUsage {
    #[serde(default)]
    pub id: String,
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default)]
    pub usage: UsageRecord,
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

/// Response document of the API key usage endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiUsageReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<ApiKeyUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostShare {
    pub name: String,
    pub cost: f64,
    pub formatted_cost: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountShare {
    pub name: String,
    pub count: u64,
    pub percentage: f64,
}

/// Aggregated usage across API keys for one report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub active_keys: usize,
    pub key_count: usize,
    pub cost_breakdown: Vec<CostShare>,
    pub request_breakdown: Vec<CountShare>,
    pub token_breakdown: Vec<CountShare>,
}

impl UsageStats {
    pub fn from_keys(keys: &[ApiKeyUsage]) -> Self {
        let mut stats = UsageStats {
            key_count: keys.len(),
            ..Default::default()
        };

        let active: Vec<(&str, UsageBucket)> = keys
            .iter()
            .map(|key| (key.name.as_str(), key.usage.current_bucket()))
            .filter(|(_, bucket)| !bucket.is_idle())
            .collect();

        for (_, bucket) in &active {
            stats.total_requests += bucket.requests;
            stats.total_tokens += bucket.all_tokens;
            stats.total_cost += bucket.cost;
        }
        stats.active_keys = active.len();

        // Shares are only meaningful once something was billed
        if stats.total_cost > 0.0 {
            let requests_base = stats.total_requests.max(1) as f64;
            let tokens_base = stats.total_tokens.max(1) as f64;

            for (name, bucket) in &active {
                stats.cost_breakdown.push(CostShare {
                    name: name.to_string(),
                    cost: bucket.cost,
                    formatted_cost: bucket.display_cost(),
                    percentage: bucket.cost / stats.total_cost * 100.0,
                });
                stats.request_breakdown.push(CountShare {
                    name: name.to_string(),
                    count: bucket.requests,
                    percentage: bucket.requests as f64 / requests_base * 100.0,
                });
                stats.token_breakdown.push(CountShare {
                    name: name.to_string(),
                    count: bucket.all_tokens,
                    percentage: bucket.all_tokens as f64 / tokens_base * 100.0,
                });
            }

            stats
                .cost_breakdown
                .sort_by(|a, b| b.cost.total_cmp(&a.cost));
            stats.request_breakdown.sort_by(|a, b| b.count.cmp(&a.count));
            stats.token_breakdown.sort_by(|a, b| b.count.cmp(&a.count));
        }

        stats
    }

    pub fn tokens_for(&self, name: &str) -> u64 {
        self.token_breakdown
            .iter()
            .find(|share| share.name == name)
            .map(|share| share.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, requests: u64, tokens: u64, cost: f64) -> ApiKeyUsage {
        ApiKeyUsage {
            id: name.to_lowercase(),
            name: name.to_string(),
            usage: UsageRecord {
                today: Some(UsageBucket {
                    requests,
                    all_tokens: tokens,
                    cost,
                    formatted_cost: None,
                }),
                daily: None,
                session_cost: None,
            },
        }
    }

    #[test]
    fn test_today_bucket_preferred_over_daily() {
        let record: UsageRecord = serde_json::from_value(serde_json::json!({
            "today": { "requests": 5, "allTokens": 10, "cost": 0.5 },
            "daily": { "requests": 99, "allTokens": 999 }
        }))
        .unwrap();
        assert_eq!(record.current_bucket().requests, 5);
    }

    #[test]
    fn test_daily_bucket_used_when_today_missing() {
        let record: UsageRecord = serde_json::from_value(serde_json::json!({
            "daily": { "requests": 42, "allTokens": 1000 }
        }))
        .unwrap();
        let bucket = record.current_bucket();
        assert_eq!(bucket.requests, 42);
        assert_eq!(bucket.all_tokens, 1000);
        assert_eq!(bucket.cost, 0.0);
    }

    #[test]
    fn test_empty_today_bucket_falls_back_to_daily() {
        let record: UsageRecord = serde_json::from_value(serde_json::json!({
            "today": {},
            "daily": { "requests": 100, "allTokens": 50000 }
        }))
        .unwrap();
        let bucket = record.current_bucket();
        assert_eq!(bucket.requests, 100);
        assert_eq!(bucket.all_tokens, 50_000);

        let stats = UsageStats::from_keys(&[ApiKeyUsage {
            id: "k".into(),
            name: "Nightly".into(),
            usage: record,
        }]);
        assert_eq!(stats.active_keys, 1);
        assert_eq!(stats.total_requests, 100);
    }

    #[test]
    fn test_stats_skip_idle_keys_and_sort_by_cost() {
        let keys = vec![
            key("Dev", 100, 2_000, 1.0),
            key("Idle", 0, 0, 0.0),
            key("Prod", 300, 6_000, 3.0),
        ];
        let stats = UsageStats::from_keys(&keys);

        assert_eq!(stats.active_keys, 2);
        assert_eq!(stats.key_count, 3);
        assert_eq!(stats.total_requests, 400);
        assert_eq!(stats.total_tokens, 8_000);
        assert!((stats.total_cost - 4.0).abs() < f64::EPSILON);

        assert_eq!(stats.cost_breakdown[0].name, "Prod");
        assert!((stats.cost_breakdown[0].percentage - 75.0).abs() < 1e-9);
        assert_eq!(stats.cost_breakdown[0].formatted_cost, "$3.00");
        assert_eq!(stats.request_breakdown[0].name, "Prod");
        assert_eq!(stats.tokens_for("Dev"), 2_000);
    }

    #[test]
    fn test_no_breakdown_without_cost() {
        let stats = UsageStats::from_keys(&[key("Free", 10, 100, 0.0)]);
        assert_eq!(stats.active_keys, 1);
        assert!(stats.cost_breakdown.is_empty());
        assert!(stats.request_breakdown.is_empty());
    }
}
