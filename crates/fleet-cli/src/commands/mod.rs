//! Command implementations.

mod evaluate;
mod replay;

pub use evaluate::EvaluateCommand;
pub use replay::{ReplayCommand, parse_notifications, replay};
