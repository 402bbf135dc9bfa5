//! SMTP adapter (lettre) for the report mailer.
//!
//! Connects with STARTTLS on the configured port and authenticates with the
//! configured user; the report goes out as multipart/mixed with the CSV as
//! an attachment.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use kbn_core::{
    config::SmtpCredentials,
    errors::Error,
    report::{MailTransport, OutgoingMail},
    Result,
};

#[derive(Clone, Debug, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn transport(smtp: &SmtpCredentials) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| Error::Config(format!("invalid SMTP host {}: {e}", smtp.host)))?;
        Ok(builder
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
            .build())
    }
}

fn mailbox(raw: &str) -> Result<Mailbox> {
    raw.parse::<Mailbox>()
        .map_err(|e| Error::Validation(format!("invalid email address {raw}: {e}")))
}

/// Render an [`OutgoingMail`] into a MIME message.
pub fn build_message(mail: OutgoingMail) -> Result<Message> {
    let content_type = ContentType::parse(&mail.attachment.content_type)
        .map_err(|e| Error::Validation(format!("invalid attachment content type: {e}")))?;
    let attachment =
        Attachment::new(mail.attachment.filename).body(mail.attachment.bytes, content_type);

    Message::builder()
        .from(mailbox(&mail.from)?)
        .to(mailbox(&mail.to)?)
        .subject(mail.subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(mail.body))
                .singlepart(attachment),
        )
        .map_err(|e| Error::External(format!("failed to build email: {e}")))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, smtp: &SmtpCredentials, mail: OutgoingMail) -> Result<()> {
        let to = mail.to.clone();
        let message = build_message(mail)?;
        let transport = Self::transport(smtp)?;
        transport
            .send(message)
            .await
            .map_err(|e| Error::External(format!("smtp error: {e}")))?;
        info!(%to, host = %smtp.host, "report mail sent");
        Ok(())
    }
}
