//! SMTP delivery of verification emails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::Mailer;
use crate::auth::otp::OTP_STEP_SECS;
use crate::config::EmailConfig;

/// Sends verification emails over SMTP
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address)
            .parse()
            .context("Invalid from address")?;
        let to: Mailbox = to_email.parse().context("Invalid recipient address")?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");

        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, name: &str, code: &str) -> Result<()> {
        let subject = format!("Your {} verification code", self.config.from_name);
        let html_body = render_otp_html(name, code, &self.config.from_name);
        let text_body = render_otp_text(name, code, &self.config.from_name);

        self.send_email(to, &subject, &html_body, &text_body).await
    }
}

/// Escape the characters that matter inside HTML text nodes
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_otp_html(name: &str, code: &str, shop_name: &str) -> String {
    let name = escape_html(name);
    let shop_name = escape_html(shop_name);
    let validity = OTP_STEP_SECS * 2;
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verify your email</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif;
            margin: 0;
            padding: 0;
            background-color: #f5f5f5;
        }}
        .container {{
            max-width: 480px;
            margin: 0 auto;
            padding: 40px 20px;
        }}
        .card {{
            background-color: #ffffff;
            border-radius: 8px;
            padding: 32px 24px;
            text-align: center;
        }}
        .code {{
            font-size: 32px;
            font-weight: 600;
            letter-spacing: 8px;
            color: #111827;
            margin: 24px 0;
        }}
        .note {{
            color: #6b7280;
            font-size: 13px;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <p>Hi {name},</p>
            <p>Use this code to verify your {shop_name} account:</p>
            <div class="code">{code}</div>
            <p class="note">The code expires in about {validity} seconds. If you did not sign up, you can ignore this email.</p>
        </div>
    </div>
</body>
</html>"#
    )
}

fn render_otp_text(name: &str, code: &str, shop_name: &str) -> String {
    let validity = OTP_STEP_SECS * 2;
    format!(
        "Hi {name},\n\nUse this code to verify your {shop_name} account:\n\n    {code}\n\nThe code expires in about {validity} seconds. If you did not sign up, you can ignore this email.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_code() {
        let html = render_otp_html("A", "123456", "Bazaar");
        assert!(html.contains("123456"));
        assert!(html.contains("Hi A,"));

        let text = render_otp_text("A", "123456", "Bazaar");
        assert!(text.contains("    123456"));
    }

    #[test]
    fn test_render_escapes_name() {
        let html = render_otp_html("<script>", "123456", "Bazaar");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_missing_host_is_an_error() {
        let mailer = SmtpMailer::new(EmailConfig::default());
        assert!(mailer.send_otp("a@x.com", "A", "123456").await.is_err());
    }
}
