pub mod buttons;
pub mod card;
pub mod dispatcher;
pub mod feishu;
pub mod transport;

pub use buttons::{ActionType, ButtonConfig, DeepLink};
pub use card::{Card, OutboundMessage};
pub use dispatcher::{BatchReport, Notifier};
pub use transport::{Transport, TransportConfig, TransportMode, TransportOptions};
