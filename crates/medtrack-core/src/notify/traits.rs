use crate::error::NotifyError;

/// Every delivery backend implements this trait.
/// Backends are stateless between calls; a send either fully succeeds or
/// reports an error the caller can retry on the next scan.
pub trait Notifier: Send + Sync {
    /// Unique identifier (e.g. "relay", "console").
    fn name(&self) -> &str;

    /// Deliver a single message to one recipient address.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}
