//! Password Reset Mail
//!
//! ForgotPassword hands reset mails to a bounded in-process outbox after its
//! transaction commits. A background worker drains the outbox and calls the
//! configured [`PasswordResetMailer`], keeping delivery latency off the
//! request path. Token creation stays synchronous and authoritative; a mail
//! that cannot be queued or delivered is logged and dropped, and the user
//! can request another link.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct PasswordResetMail {
    pub to: String,
    pub reset_url: String,
    pub expires_in_minutes: i64,
}

// The URL embeds a live reset token.
impl fmt::Debug for PasswordResetMail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetMail")
            .field("to", &self.to)
            .field("reset_url", &"[REDACTED]")
            .field("expires_in_minutes", &self.expires_in_minutes)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// Outbound delivery port for reset mails
#[trait_variant::make(PasswordResetMailer: Send)]
pub trait LocalPasswordResetMailer {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> Result<(), MailError>;
}

/// Development mailer that logs instead of sending
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl PasswordResetMailer for LogMailer {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            expires_in_minutes = mail.expires_in_minutes,
            "Password reset mail send stub"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct MailOutbox {
    tx: mpsc::Sender<PasswordResetMail>,
}

impl MailOutbox {
    /// Outbox plus the receiving end for [`spawn_mail_worker`]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PasswordResetMail>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue without waiting; returns whether the mail was accepted
    pub fn enqueue(&self, mail: PasswordResetMail) -> bool {
        match self.tx.try_send(mail) {
            Ok(()) => true,
            Err(TrySendError::Full(mail)) => {
                tracing::warn!(to = %mail.to, "Mail outbox full, dropping reset mail");
                false
            }
            Err(TrySendError::Closed(mail)) => {
                tracing::error!(to = %mail.to, "Mail worker stopped, dropping reset mail");
                false
            }
        }
    }
}

/// Drain the outbox until every sender is dropped
pub fn spawn_mail_worker<M>(
    mut rx: mpsc::Receiver<PasswordResetMail>,
    mailer: Arc<M>,
) -> JoinHandle<()>
where
    M: PasswordResetMailer + Sync + 'static,
{
    tokio::spawn(async move {
        while let Some(mail) = rx.recv().await {
            if let Err(e) = mailer.send_password_reset(&mail).await {
                tracing::error!(to = %mail.to, error = %e, "Password reset mail failed");
            }
        }
        tracing::debug!("Mail worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> PasswordResetMail {
        PasswordResetMail {
            to: to.to_string(),
            reset_url: "https://portal.test/reset?token=secret".to_string(),
            expires_in_minutes: 60,
        }
    }

    #[test]
    fn test_debug_redacts_url() {
        let rendered = format!("{:?}", mail("a@x.com"));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("a@x.com"));
    }

    #[tokio::test]
    async fn test_full_outbox_drops() {
        let (outbox, _rx) = MailOutbox::channel(1);
        assert!(outbox.enqueue(mail("a@x.com")));
        assert!(!outbox.enqueue(mail("b@x.com")));
    }

    #[tokio::test]
    async fn test_worker_drains_until_closed() {
        let (outbox, rx) = MailOutbox::channel(4);
        outbox.enqueue(mail("a@x.com"));
        drop(outbox);

        let handle = spawn_mail_worker(rx, Arc::new(LogMailer));
        handle.await.unwrap();
    }
}
