// onboard-service/src/services/email.rs
//! Invitation emails.
//!
//! The onboarding service only needs "send this invitation URL to this member" and a
//! success flag; [`EmailProvider`] is that seam, [`SmtpMailer`] the production side.

use crate::models::MemberRecord;
use crate::utils::config::EmailSettings;
use async_trait::async_trait;
use derive_more::Display;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::error;
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Display, Clone, PartialEq)]
pub enum EmailError {
    #[display(fmt = "Invalid recipient: {}", _0)]
    InvalidRecipient(String),
    #[display(fmt = "Invalid configuration: {}", _0)]
    InvalidConfig(String),
    #[display(fmt = "Failed to send email: {}", _0)]
    SendFailed(String),
}

impl std::error::Error for EmailError {}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_team_invite(&self, member: &MemberRecord, invite_url: &str) -> Result<(), EmailError>;
}

// Rejects records the mail server would bounce anyway
pub fn validate_recipient(member: &MemberRecord) -> Result<(), EmailError> {
    if member.email.trim().is_empty() || member.firstname.trim().is_empty() || member.team.trim().is_empty() {
        return Err(EmailError::InvalidRecipient(format!("Missing user data for {}", member.email)));
    }

    let domain = member.email.rsplit('@').next().unwrap_or_default();
    if !member.email.contains('@') || !domain.contains('.') {
        return Err(EmailError::InvalidRecipient(format!("Invalid email: {}", member.email)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct InviteEmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl InviteEmailContent {
    pub fn new(subject: &str, member: &MemberRecord, invite_url: &str) -> Self {
        let text = format!(
            "{team},\n\nDear {first},\n\nYou have been placed in team {team}. \
             Join the community with your personal invitation link:\n{url}\n",
            team = member.team,
            first = member.firstname,
            url = invite_url,
        );
        let html = format!(
            "<html>\n<body>\n<p><strong>{team},</strong><br>\nDear {first},</p>\n\
             <p>You have been placed in team {team}.</p>\n\
             <p>🔗 <strong>Invitation link:</strong><br>\n<a href=\"{url}\">{url}</a></p>\n</body>\n</html>\n",
            team = member.team,
            first = member.firstname,
            url = invite_url,
        );

        Self {
            subject: subject.to_string(),
            text,
            html,
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    subject: String,
}

impl SmtpMailer {
    // Port 465 uses implicit TLS, every other port STARTTLS
    pub fn new(settings: &EmailSettings) -> Result<Self, EmailError> {
        let builder = if settings.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)
        }
        .map_err(|e| EmailError::InvalidConfig(format!("SMTP relay error: {}", e)))?;

        let transport = builder
            .port(settings.smtp_port)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(settings.address.clone(), settings.password.clone()))
            .build();

        let from = settings
            .address
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidConfig(format!("Invalid from address: {}", e)))?;

        Ok(Self {
            transport,
            from,
            subject: settings.subject.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpMailer {
    async fn send_team_invite(&self, member: &MemberRecord, invite_url: &str) -> Result<(), EmailError> {
        validate_recipient(member)?;
        let content = InviteEmailContent::new(&self.subject, member, invite_url);

        let to = member
            .email
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidRecipient(format!("{}: {}", member.email, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(content.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(content.text))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(content.html)),
            )
            .map_err(|e| EmailError::SendFailed(format!("Failed to build email: {}", e)))?;

        self.transport.send(message).await.map_err(|e| {
            error!("❌ SMTP Error for {}: {}", member.email, e);
            EmailError::SendFailed(e.to_string())
        })?;

        Ok(())
    }
}
