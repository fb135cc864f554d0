// src/notify/email.rs
//! SMTP transport via lettre.

use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use crate::config::EmailConfig;
use crate::error::DeliveryError;

use super::{digest, NotificationBatch, NotificationTransport};

pub struct EmailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailTransport {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self, DeliveryError> {
        if cfg.smtp_server.is_empty()
            || cfg.sender_email.is_empty()
            || cfg.recipient_email.is_empty()
        {
            return Err(DeliveryError::NotConfigured(
                "smtp_server, sender_email and recipient_email are required".into(),
            ));
        }

        let creds = Credentials::new(cfg.sender_email.clone(), cfg.sender_password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_server)
            .map_err(|e| DeliveryError::NotConfigured(format!("invalid smtp_server: {e}")))?
            .port(cfg.smtp_port)
            .credentials(creds)
            .build();

        let from = cfg
            .sender_email
            .parse()
            .map_err(|e| DeliveryError::NotConfigured(format!("invalid sender_email: {e}")))?;
        let to = cfg
            .recipient_email
            .parse()
            .map_err(|e| DeliveryError::NotConfigured(format!("invalid recipient_email: {e}")))?;

        Ok(Self { mailer, from, to })
    }

    async fn send(&self, subject: String, body: String) -> Result<(), DeliveryError> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| DeliveryError::Smtp(format!("build email: {e}")))?;

        self.mailer
            .send(msg)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;
        Ok(())
    }

    /// One-off message to verify SMTP configuration end to end.
    pub async fn send_test_message(&self) -> Result<(), DeliveryError> {
        self.send(
            "firmwatch test notification".to_string(),
            format!(
                "Test notification sent at {}.\n\
                 If you can read this, the notification transport works.",
                chrono::Utc::now().to_rfc3339()
            ),
        )
        .await
    }
}

#[async_trait]
impl NotificationTransport for EmailTransport {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<(), DeliveryError> {
        self.send(digest::subject(batch), digest::render(batch)).await
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
