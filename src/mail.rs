use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::{Arc, Mutex};

use crate::{config::SmtpConfig, error::AppError, models::AuthorAction};

/// A rendered plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

// 1. Mailer Contract
/// Mailer
///
/// Outbound email transport. Production uses SMTP; local runs and tests use the
/// in-process outbox.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

pub type MailerState = Arc<dyn Mailer>;

/// deliver
///
/// Sends `email` and swallows the failure after logging it. Email is a side
/// effect: a broken relay must not fail the request that triggered it.
pub async fn deliver(mailer: &MailerState, email: OutgoingEmail) {
    let to = email.to.clone();
    let subject = email.subject.clone();
    match mailer.send(email).await {
        Ok(()) => tracing::info!(%to, %subject, "email sent"),
        Err(e) => tracing::error!(%to, %subject, error = %e, "email delivery failed"),
    }
}

// 2. SMTP implementation
/// SmtpMailer
///
/// Delivers through an authenticated STARTTLS relay with a pooled async transport.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, AppError> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Mail(format!("invalid sender address `{from}`: {e}")))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Mail(format!("invalid SMTP relay: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Mail(format!("invalid recipient: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Mail(e.to_string()))
    }
}

// 3. Outbox implementation
/// OutboxMailer
///
/// Records every message instead of sending it, and logs it so local developers
/// can follow reset and invite links from the console.
#[derive(Clone, Default)]
pub struct OutboxMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    should_fail: bool,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Messages recorded so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        self.sent().into_iter().filter(|m| m.to == address).collect()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Mail("outbox: simulated failure".to_string()));
        }
        tracing::debug!(to = %email.to, subject = %email.subject, body = %email.body, "outbox email");
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email);
        Ok(())
    }
}

// --- Templates ---

pub fn welcome(to: &str, name: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Welcome to Inkwell".to_string(),
        body: format!(
            "Hi {name},\n\nYour Inkwell account is ready. Apply to become an author \
             from your profile page whenever you want to start publishing.\n\nThe Inkwell team"
        ),
    }
}

pub fn password_reset(to: &str, name: &str, link: &str, ttl_minutes: i64) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset your Inkwell password".to_string(),
        body: format!(
            "Hi {name},\n\nUse the link below to choose a new password. It expires in \
             {ttl_minutes} minutes and can be used once.\n\n{link}\n\n\
             If you did not ask for this, you can ignore this email."
        ),
    }
}

pub fn author_decision(
    to: &str,
    name: &str,
    action: AuthorAction,
    note: Option<&str>,
) -> OutgoingEmail {
    let verb = action.verb();
    let mut body = format!("Hi {name},\n\nYour author account has been {verb}.");
    if let Some(note) = note {
        body.push_str(&format!("\n\nNote from the moderators: {note}"));
    }
    body.push_str("\n\nThe Inkwell team");
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Your author application was {verb}"),
        body,
    }
}

pub fn blog_decision(to: &str, name: &str, title: &str, approved: bool) -> OutgoingEmail {
    let (subject, line) = if approved {
        (
            format!("\"{title}\" is now live"),
            "has been approved and is now visible to readers.",
        )
    } else {
        (
            format!("\"{title}\" was unpublished"),
            "has been moved back to moderation and is no longer visible to readers.",
        )
    };
    OutgoingEmail {
        to: to.to_string(),
        subject,
        body: format!("Hi {name},\n\nYour post \"{title}\" {line}\n\nThe Inkwell team"),
    }
}

pub fn admin_invite(to: &str, inviter: &str, link: &str, ttl_hours: i64) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "You have been invited to administer Inkwell".to_string(),
        body: format!(
            "Hello,\n\n{inviter} invited you to become an Inkwell administrator. Sign in \
             with this email address and open the link below within {ttl_hours} hours.\n\n{link}"
        ),
    }
}
