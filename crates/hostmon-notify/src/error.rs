/// Errors that can occur within the notification subsystem.
///
/// # Examples
///
/// ```rust
/// use hostmon_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing smtp_host".to_string());
/// assert!(err.to_string().contains("smtp_host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// The channel did not answer within the allotted time.
    #[error("Notify: {channel} did not respond within {secs}s")]
    Timeout { channel: String, secs: u64 },

    /// Generic notification error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        NotifyError::Smtp(e.to_string())
    }
}

impl From<lettre::error::Error> for NotifyError {
    fn from(e: lettre::error::Error) -> Self {
        NotifyError::Other(format!("failed to build message: {e}"))
    }
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
