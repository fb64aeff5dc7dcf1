//! Outgoing mail
//!
//! Password reset links are delivered over SMTP with lettre. When no SMTP
//! host is configured the message is not sent and a warning is logged, which
//! keeps local development working without a mail server.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::MultiPart, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Delivers account mail
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the reset link to `to`
    async fn send_password_reset(&self, to: &str, name: &str, reset_url: &str) -> Result<()>;
}

/// SMTP mailer backed by lettre
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.config.smtp_port);

        if !self.config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_password_reset(&self, to: &str, name: &str, reset_url: &str) -> Result<()> {
        if !self.config.is_configured() {
            tracing::warn!(recipient = %to, "SMTP not configured, password reset mail not sent");
            tracing::debug!(reset_url = %reset_url, "Undelivered password reset link");
            return Ok(());
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let (plain, html) = password_reset_bodies(name, reset_url);

        let email = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject("Reset your Research Locker password")
            .multipart(MultiPart::alternative_plain_html(plain, html))
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport()?
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::info!(recipient = %to, "Password reset mail sent");
        Ok(())
    }
}

/// Plain-text and HTML bodies of the reset mail
fn password_reset_bodies(name: &str, reset_url: &str) -> (String, String) {
    let plain = format!(
        "Hello {name},\n\nWe received a request to reset your Research Locker password.\n\
         Open the link below to choose a new one:\n\n{url}\n\n\
         The link expires in one hour. If you did not ask for this, you can ignore this email.\n",
        name = name,
        url = reset_url
    );

    let name = html_escape(name);
    let url = html_escape(reset_url);
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Reset Your Password - Research Locker</title></head>
<body style="font-family: sans-serif; color: #333;">
  <h1 style="color: #0d9488;">Research Locker</h1>
  <p>Hello {name},</p>
  <p>We received a request to reset your password. Click the button below to choose a new one.</p>
  <p><a href="{url}" style="background: #0d9488; color: #fff; padding: 12px 24px; border-radius: 6px; text-decoration: none;">Reset Password</a></p>
  <p>Or copy this link into your browser:<br><a href="{url}">{url}</a></p>
  <p>The link expires in one hour. If you did not ask for this, you can ignore this email.</p>
</body>
</html>"#,
        name = name,
        url = url
    );

    (plain, html)
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_smtp_is_a_noop() {
        let mailer = EmailService::new(EmailConfig::default());
        mailer
            .send_password_reset("user@example.com", "User", "http://localhost/reset?token=x")
            .await
            .expect("unconfigured mailer should not fail");
    }

    #[test]
    fn test_reset_bodies_escape_name() {
        let (plain, html) = password_reset_bodies("<b>Eve</b>", "https://app/reset-password?token=a&b=c");
        assert!(plain.contains("https://app/reset-password?token=a&b=c"));
        assert!(html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(html.contains("token=a&amp;b=c"));
        assert!(!html.contains("<b>Eve"));
    }
}
