use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
    #[error("invalid link: {0}")]
    Link(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Outgoing email transport.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

/// Writes mails to the log instead of delivering them.
pub struct LogSender;

#[async_trait]
impl Sender for LogSender {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.text, "Outgoing mail");
        Ok(())
    }
}

/// Keeps every mail in memory. Can be switched to fail delivery.
#[derive(Default)]
pub struct MemorySender {
    sent: Mutex<Vec<Mail>>,
    failing: Mutex<bool>,
}

impl MemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut f) = self.failing.lock() {
            *f = failing;
        }
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Mail> {
        self.sent.lock().ok().and_then(|s| s.last().cloned())
    }
}

#[async_trait]
impl Sender for MemorySender {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(MailError::Delivery("mailbox unavailable".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        Ok(())
    }
}

/// Link landing on the verification endpoint of the service at `origin`.
pub fn magic_link(origin: &str, email: &str, code: &str, redirect_uri: &str) -> Result<Url, MailError> {
    let mut url = Url::parse(origin)?.join("/api/v1/auth/verify_magic_link")?;
    url.query_pairs_mut()
        .append_pair("email", email)
        .append_pair("code", code)
        .append_pair("redirect_uri", redirect_uri);
    Ok(url)
}

pub fn magic_link_mail(to: &str, link: &Url, update_email: bool) -> Mail {
    let (subject, action) = if update_email {
        ("Confirm your new email address", "confirm your new email address")
    } else {
        ("Your Nakama login link", "log in to Nakama")
    };
    Mail {
        to: to.to_string(),
        subject: subject.to_string(),
        text: format!(
            "Hi,\n\nFollow this link to {action}:\n\n{link}\n\n\
             The link expires in two hours and works only once. \
             If you did not ask for it, you can ignore this email.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_link_carries_query() {
        let link = magic_link(
            "http://localhost:4444",
            "john@example.org",
            "abc",
            "http://localhost:4444/feed?x=1",
        )
        .unwrap();
        assert_eq!(link.path(), "/api/v1/auth/verify_magic_link");
        let pairs: Vec<(String, String)> = link.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("email".to_string(), "john@example.org".to_string()),
                ("code".to_string(), "abc".to_string()),
                ("redirect_uri".to_string(), "http://localhost:4444/feed?x=1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn memory_sender_records_and_fails_on_demand() {
        let sender = MemorySender::new();
        let link = magic_link("http://localhost:4444", "a@b.c", "x", "http://localhost:4444/").unwrap();
        sender.send(magic_link_mail("a@b.c", &link, false)).await.unwrap();
        assert_eq!(sender.sent().len(), 1);
        assert!(sender.last().unwrap().text.contains("code=x"));

        sender.set_failing(true);
        assert!(sender.send(magic_link_mail("a@b.c", &link, true)).await.is_err());
        assert_eq!(sender.sent().len(), 1);
    }
}
