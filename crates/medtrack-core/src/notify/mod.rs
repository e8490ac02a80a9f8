//! Outbound patient notifications.
//!
//! A single [`Notifier`] trait fronts the delivery backends: an HTTP mail
//! relay for production and a console backend for development. Message
//! bodies are rendered by [`message`] so every backend sends the same text.

mod console;
mod mailer;
pub mod message;
mod traits;

pub use console::ConsoleMailer;
pub use mailer::HttpMailer;
pub use traits::Notifier;
