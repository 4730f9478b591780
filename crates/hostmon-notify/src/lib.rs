//! Outbound alert delivery.
//!
//! A [`Notifier`] takes a ready-made subject and body and hands them to an
//! external channel. It keeps no per-message state, so one instance can be
//! shared by every sensor the alert engine watches. Built-in channels are
//! SMTP email and a log-only channel used when no mail server is configured.

pub mod channels;
pub mod error;


use async_trait::async_trait;
use error::Result;

/// A notification delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel rejected or could not deliver the
    /// message. Callers decide whether to retry; channels do not.
    async fn send(&self, subject: &str, body: &str) -> Result<()>;

    /// Returns the channel type name (e.g., `"email"`, `"log"`).
    fn channel_name(&self) -> &str;
}
