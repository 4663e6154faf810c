pub mod account;
pub mod change;
pub mod usage;

pub use account::{AccountSnapshot, RateLimit, SnapshotCollection, Usage};
pub use change::{ChangeReason, ChangeRecord};
pub use usage::{ApiKeyUsage, ApiUsageReport, UsageBucket, UsageRecord, UsageStats};
