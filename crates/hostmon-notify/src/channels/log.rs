use crate::error::Result;
use crate::Notifier;
use async_trait::async_trait;

/// Writes alerts to the log instead of delivering them. Used when no mail
/// server is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        tracing::warn!(subject, body, "Alert (no delivery channel configured)");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
