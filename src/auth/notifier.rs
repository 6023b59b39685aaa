use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::models::User;

#[derive(Debug, Error)]
#[error("Failed to deliver reset notification: {0}")]
pub struct NotifyError(pub String);

/// Delivers password reset links to users
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset(&self, user: &User, reset_url: &str) -> Result<(), NotifyError>;
}

/// Writes reset requests to the log instead of sending mail. The link
/// carries a live token, so it is only logged when `reveal_links` is set.
pub struct LogNotifier {
    reveal_links: bool,
}

impl LogNotifier {
    pub fn new(reveal_links: bool) -> Self {
        Self { reveal_links }
    }

    fn loggable_link<'a>(&self, reset_url: &'a str) -> Option<&'a str> {
        self.reveal_links.then_some(reset_url)
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset(&self, user: &User, reset_url: &str) -> Result<(), NotifyError> {
        info!(user_id = %user.id, email = %user.email, "Password reset requested");
        if let Some(reset_url) = self.loggable_link(reset_url) {
            debug!(user_id = %user.id, reset_url, "Password reset link");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_stay_out_of_the_log_unless_revealed() {
        let url = "http://localhost:3000/api/v1/users/resetPassword/abc123";
        assert_eq!(LogNotifier::new(false).loggable_link(url), None);
        assert_eq!(LogNotifier::new(true).loggable_link(url), Some(url));
    }
}
