use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::MailConfig;

/// Outbound mail seam. Delivery is always best-effort for callers:
/// registration must never fail because a message could not be sent.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let credentials =
            Credentials::new(cfg.smtp_username.clone(), cfg.smtp_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
            .context("smtp relay")?
            .port(cfg.smtp_port)
            .credentials(credentials)
            .build();
        let from = cfg
            .from
            .parse::<Mailbox>()
            .context("parse sender address")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, text: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("parse recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
            .context("build message")?;
        self.transport.send(message).await.context("smtp send")?;
        debug!(to, subject, "email sent");
        Ok(())
    }
}

/// Used when SMTP is not configured, and in tests.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _text: &str) -> anyhow::Result<()> {
        debug!(to, subject, "mailer not configured; dropping email");
        Ok(())
    }
}
