/// Outbound email
///
/// The auth core hands finished messages to a [`Mailer`]. Rendering and
/// transport are the mailer's concern.
///
/// # Implementations
///
/// - [`LogMailer`]: writes messages to the log, for local development
/// - [`MemoryMailer`]: keeps an outbox in memory, for tests
///
/// # Example
///
/// ```
/// use projectcamp_shared::mail::{Email, Mailer, MemoryMailer};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mailer = MemoryMailer::new();
/// mailer
///     .send(Email {
///         to: "alice@x.com".to_string(),
///         subject: "Hello".to_string(),
///         body: "Hi Alice".to_string(),
///     })
///     .await?;
/// assert_eq!(mailer.outbox().await.len(), 1);
/// # Ok(())
/// # }
/// ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Transport refused or failed to deliver the message
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Mailer that only logs
///
/// The body contains live tokens, so it is logged at debug level only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Sending email");
        tracing::debug!(body = %email.body, "Email body");
        Ok(())
    }
}

/// Mailer that records every message
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages delivered so far, oldest first
    pub async fn outbox(&self) -> Vec<Email> {
        self.outbox.lock().await.clone()
    }

    /// Most recent message sent to an address
    pub async fn last_to(&self, to: &str) -> Option<Email> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|email| email.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Delivery("mailer is configured to fail".to_string()));
        }
        self.outbox.lock().await.push(email);
        Ok(())
    }
}

/// Extracts the token from the last path segment of the first link in a body
///
/// Test helper for flows that deliver tokens by email.
pub fn token_from_link(body: &str) -> Option<&str> {
    body.split_whitespace()
        .find(|word| word.starts_with("http://") || word.starts_with("https://"))
        .and_then(|link| link.rsplit('/').next())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "Subject".to_string(),
            body: format!("Open https://app.test/v1/users/verify-email/abc123 now, {to}"),
        }
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        mailer.send(email("a@x.com")).await.unwrap();
        mailer.send(email("b@x.com")).await.unwrap();

        assert_eq!(mailer.outbox().await.len(), 2);
        assert_eq!(mailer.last_to("a@x.com").await.unwrap().to, "a@x.com");
        assert!(mailer.last_to("c@x.com").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_mailer_failing() {
        let mailer = MemoryMailer::new();
        mailer.set_failing(true);
        assert!(mailer.send(email("a@x.com")).await.is_err());
        assert!(mailer.outbox().await.is_empty());

        mailer.set_failing(false);
        assert!(mailer.send(email("a@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts() {
        assert!(LogMailer.send(email("a@x.com")).await.is_ok());
    }

    #[test]
    fn test_token_from_link() {
        assert_eq!(token_from_link(&email("a@x.com").body), Some("abc123"));
        assert_eq!(token_from_link("no link here"), None);
    }
}
