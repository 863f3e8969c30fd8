//! Messaging adapters (Slack).

pub mod slack;
pub mod traits;

pub use traits::{InboundStream, Messaging, MessagingDyn};
