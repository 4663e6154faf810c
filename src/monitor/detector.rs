use std::collections::HashMap;

use crate::models::{AccountSnapshot, ChangeReason, ChangeRecord};

/// Compare one account against the previous snapshot's accounts
pub fn detect(current: &AccountSnapshot, previous: &[AccountSnapshot]) -> ChangeRecord {
    let prev = previous.iter().find(|p| p.id == current.id);
    compare(current, prev)
}

/// Compare every account, preserving input order.
///
/// With `force_all` each record is marked changed but keeps the reason
/// the comparison produced.
pub fn detect_all(
    current: &[AccountSnapshot],
    previous: &[AccountSnapshot],
    force_all: bool,
) -> Vec<ChangeRecord> {
    // first occurrence wins, same as a linear scan
    let mut index: HashMap<&str, &AccountSnapshot> = HashMap::with_capacity(previous.len());
    for account in previous {
        index.entry(account.id.as_str()).or_insert(account);
    }

    current
        .iter()
        .map(|account| {
            let mut record = compare(account, index.get(account.id.as_str()).copied());
            if force_all {
                record.changed = true;
            }
            record
        })
        .collect()
}

fn compare(current: &AccountSnapshot, previous: Option<&AccountSnapshot>) -> ChangeRecord {
    let record = |changed, reason| ChangeRecord {
        account_id: current.id.clone(),
        changed,
        reason,
    };

    let Some(prev) = previous else {
        tracing::info!("New account discovered: {}", current.id);
        return record(true, ChangeReason::NewAccount);
    };

    let was_limited = prev.rate_limit.is_limited;
    let is_limited = current.rate_limit.is_limited;

    if was_limited != is_limited {
        tracing::info!(
            "Account {} limit status changed: {} -> {}",
            current.id,
            was_limited,
            is_limited
        );
        return record(true, ChangeReason::LimitStatusFlip);
    }

    if is_limited
        && prev.rate_limit.minutes_remaining != current.rate_limit.minutes_remaining
    {
        tracing::info!(
            "Account {} remaining limit time changed: {} -> {} minutes",
            current.id,
            prev.rate_limit.minutes_remaining,
            current.rate_limit.minutes_remaining
        );
        return record(true, ChangeReason::RemainingTimeDelta);
    }

    record(false, ChangeReason::Unchanged)
}
