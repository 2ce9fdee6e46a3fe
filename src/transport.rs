//! Seams to the external collaborators: the email sender and the PNG
//! snapshot renderer.
//!
//! The engine only depends on the traits; production wires in the SMTP
//! mailer, tests wire in recorders and failers.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::db::{DbCard, DbItem};
use crate::error::ReminderError;

/// A fully composed message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub recipient: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outbound email delivery. Blocking; failure means "defer and retry",
/// never "disable".
pub trait EmailTransport: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), ReminderError>;
}

/// Card snapshot rendering. The engine mints and resolves tokens; pixels
/// come from outside.
pub trait SnapshotRenderer: Send + Sync {
    fn render(
        &self,
        card: &DbCard,
        items: &[DbItem],
        show_completions: bool,
    ) -> Result<Vec<u8>, ReminderError>;
}

/// SMTP delivery over lettre.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, ReminderError> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| ReminderError::Transport(format!("invalid from address: {e}")))?;

        let mut builder = SmtpTransport::relay(&config.host)
            .map_err(|e| ReminderError::Transport(format!("SMTP relay setup failed: {e}")))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl EmailTransport for SmtpMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), ReminderError> {
        let to: Mailbox = email
            .recipient
            .parse()
            .map_err(|e| ReminderError::Transport(format!("invalid recipient: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| ReminderError::Transport(format!("message build failed: {e}")))?;

        self.transport
            .send(&message)
            .map_err(|e| ReminderError::Transport(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}
