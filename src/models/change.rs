use serde::Serialize;

/// Why an account was or was not considered changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeReason {
    NewAccount,
    LimitStatusFlip,
    RemainingTimeDelta,
    Unchanged,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::NewAccount => "new-account",
            ChangeReason::LimitStatusFlip => "limit-status-flip",
            ChangeReason::RemainingTimeDelta => "remaining-time-delta",
            ChangeReason::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing one account against the previous snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub account_id: String,
    pub changed: bool,
    pub reason: ChangeReason,
}
