use crate::error::{NotifyError, Result};
use crate::Notifier;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use std::time::Duration;

/// `[smtp]` section of the alerter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Use STARTTLS on a plain connection instead of implicit TLS.
    #[serde(default)]
    pub starttls: bool,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,
    /// Recipients; the sender's own address when empty.
    #[serde(default)]
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    465
}

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    /// Builds the SMTP transport. `timeout` bounds each SMTP command.
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self> {
        let from: Mailbox = parse_mailbox("from", &config.from)?;
        let to = if config.to.is_empty() {
            vec![from.clone()]
        } else {
            config
                .to
                .iter()
                .map(|addr| parse_mailbox("to", addr))
                .collect::<Result<Vec<_>>>()?
        };

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        };
        let mut builder = builder.port(config.smtp_port).timeout(Some(timeout));

        match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(pass)) => {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(NotifyError::InvalidConfig(
                    "smtp_username and smtp_password must be set together".to_string(),
                ));
            }
            (None, None) => {}
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.to
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        Ok(builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?)
    }
}

fn parse_mailbox(field: &str, addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e| NotifyError::InvalidConfig(format!("invalid {field} address '{addr}': {e}")))
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let email = self.build_message(subject, body)?;
        self.transport.send(email).await?;
        tracing::debug!(subject, recipients = self.to.len(), "Email sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
