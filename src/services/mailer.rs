use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Outbound mail over an SMTP relay (implicit TLS, port 465). When mail is
/// disabled the reset link is logged instead, which is what tests and local
/// development run with.
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    base_url: String,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let (transport, from) = if config.enabled {
            let from_addr = if config.from.is_empty() {
                &config.username
            } else {
                &config.from
            };

            let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build();

            (Some(transport), Some(from_addr.parse()?))
        } else {
            (None, None)
        };

        Ok(Self {
            transport,
            from,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset_password/{token}", self.base_url)
    }

    /// Send the one transactional message this application has: a
    /// password-reset link.
    pub async fn send_password_reset(
        &self,
        to: &str,
        token: &str,
        valid_minutes: u64,
    ) -> Result<(), MailError> {
        let link = self.reset_link(token);

        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            info!(%to, %link, "Mail disabled; logging password-reset link instead of sending");
            return Ok(());
        };

        let message = Message::builder()
            .from(from.clone())
            .to(to.parse()?)
            .subject("Password Reset Request")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "To reset your password, visit the following link within {valid_minutes} minutes:\n\
                 \n\
                 {link}\n\
                 \n\
                 If you did not make this request, you can safely ignore this email.\n"
            ))?;

        transport.send(message).await?;
        info!(%to, "Password-reset email sent");

        Ok(())
    }
}
