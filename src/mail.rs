//! Outgoing e-mail.
//!
//! Messages are handed to a pool of [`Mailer`] actors which deliver them through a
//! [`Backend`]: an SMTP relay, or the log for local development.

use actix::prelude::*;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message as MimeMessage, SmtpTransport, Transport};
use std::sync::Arc;

use crate::config::{Config, MailBackend};


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Message has no recipients")]
    NoRecipients,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub from: String,
    pub to: Vec<String>,
    /// Report delivery errors as success, they are only logged.
    pub fail_silently: bool,
}

impl Email {
    pub fn to_message(&self) -> Result<MimeMessage, Error> {
        if self.to.is_empty() {
            return Err(Error::NoRecipients);
        }

        let mut builder = MimeMessage::builder()
            .from(self.from.parse::<Mailbox>()?)
            .subject(self.subject.as_str());

        for to in &self.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }

        let message = match &self.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                self.body.clone(),
                html.clone(),
            ))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(self.body.clone())?,
        };

        Ok(message)
    }
}


pub trait Backend: Send + Sync {
    fn deliver(&self, email: &Email) -> Result<(), Error>;
}

/// Delivers through an SMTP relay.
pub struct Smtp {
    transport: SmtpTransport,
}

impl Smtp {
    pub fn new(cfg: &Config) -> Self {
        let mut builder =
            SmtpTransport::builder_dangerous(cfg.smtp_host.as_str()).port(cfg.smtp_port);

        if let (Some(username), Some(password)) = (&cfg.smtp_username, &cfg.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Smtp {
            transport: builder.build(),
        }
    }
}

impl Backend for Smtp {
    fn deliver(&self, email: &Email) -> Result<(), Error> {
        self.transport.send(&email.to_message()?)?;

        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
pub struct Console;

impl Backend for Console {
    fn deliver(&self, email: &Email) -> Result<(), Error> {
        let message = email.to_message()?;

        log::info!("\n{}", String::from_utf8_lossy(&message.formatted()));

        Ok(())
    }
}

pub fn backend(cfg: &Config) -> Arc<dyn Backend> {
    match cfg.mail_backend {
        MailBackend::Console => Arc::new(Console),
        MailBackend::Smtp => Arc::new(Smtp::new(cfg)),
    }
}


/// Synchronous mail worker, run it on a `SyncArbiter`.
pub struct Mailer {
    backend: Arc<dyn Backend>,
}

impl Mailer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Mailer { backend }
    }
}

impl Actor for Mailer {
    type Context = SyncContext<Self>;
}


pub struct SendEmail(pub Email);

impl Message for SendEmail {
    type Result = Result<(), Error>;
}

impl Handler<SendEmail> for Mailer {
    type Result = <SendEmail as Message>::Result;

    fn handle(&mut self, msg: SendEmail, _: &mut Self::Context) -> Self::Result {
        let email = msg.0;

        match self.backend.deliver(&email) {
            Ok(()) => {
                log::info!("Sent {:?} to {}", email.subject, email.to.join(", "));
                Ok(())
            }
            Err(e) if email.fail_silently => {
                log::warn!(
                    "Could not send {:?} to {}: {}",
                    email.subject,
                    email.to.join(", "),
                    e
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
