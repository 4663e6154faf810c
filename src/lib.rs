pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod server;
pub mod source;
pub mod storage;

pub use config::AppConfig;
pub use monitor::{Command, CommandOutcome, Monitor};
pub use notify::Notifier;
pub use server::CallbackServer;
