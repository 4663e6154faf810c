pub mod cycle;
pub mod detector;

pub use cycle::{Command, CommandOutcome, Monitor};
pub use detector::{detect, detect_all};
