//! Outbound email for account verification.
//!
//! Handlers only see the [`Mailer`] trait. With SMTP configured the
//! [`email::SmtpMailer`] delivers messages; otherwise [`LogMailer`] records
//! that a message would have been sent so local setups keep working.

pub mod email;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EmailConfig;

pub use email::SmtpMailer;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a one-time verification code to `to`
    async fn send_otp(&self, to: &str, name: &str, code: &str) -> Result<()>;
}

/// Mailer used when SMTP is not configured
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, to: &str, name: &str, code: &str) -> Result<()> {
        tracing::warn!(to = %to, "Email not configured, skipping verification email");
        tracing::debug!(to = %to, name = %name, code = %code, "Undelivered verification code");
        Ok(())
    }
}

/// Pick the mailer implementation for the given configuration
pub fn mailer_from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    if config.is_configured() {
        Arc::new(SmtpMailer::new(config.clone()))
    } else {
        tracing::warn!("SMTP not configured, verification codes will only be logged at debug level");
        Arc::new(LogMailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        LogMailer.send_otp("a@x.com", "A", "123456").await.unwrap();
    }
}
