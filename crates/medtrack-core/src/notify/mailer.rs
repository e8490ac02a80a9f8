//! HTTP mail relay backend -- post messages as JSON to a configured relay.

use reqwest::Client;
use serde_json::json;

use crate::error::NotifyError;
use crate::notify::traits::Notifier;
use crate::storage::config::NotificationsConfig;

/// Delivers mail by posting `{from, to, subject, text}` to an HTTP relay
/// endpoint, optionally authenticated with a bearer token.
pub struct HttpMailer {
    endpoint: String,
    token: Option<String>,
    from_name: String,
}

impl HttpMailer {
    /// Build a mailer from the notification settings.
    ///
    /// # Errors
    /// Returns [`NotifyError::NotConfigured`] when no relay URL is set.
    pub fn from_config(cfg: &NotificationsConfig) -> Result<Self, NotifyError> {
        let endpoint = cfg
            .relay_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or(NotifyError::NotConfigured)?;
        Ok(Self {
            endpoint,
            token: cfg.relay_token.clone(),
            from_name: cfg.from_name.clone(),
        })
    }

    #[cfg(test)]
    fn with_endpoint(endpoint: String, token: Option<String>) -> Self {
        Self {
            endpoint,
            token,
            from_name: "Your Medical Treatment Team".to_string(),
        }
    }
}

impl Notifier for HttpMailer {
    fn name(&self) -> &str {
        "relay"
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let client = Client::new();
        let payload = json!({
            "from": self.from_name,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let mut request = client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = tokio::runtime::Handle::current()
            .block_on(request.send())
            .map_err(|e| NotifyError::SendFailed {
                recipient: to.to_string(),
                message: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let text = tokio::runtime::Handle::current()
                .block_on(resp.text())
                .unwrap_or_default();
            Err(NotifyError::RelayRejected { status, body: text })
        }
    }
}
