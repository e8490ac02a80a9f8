//! Console delivery backend -- prints messages to stderr.
//!
//! Used whenever no mail relay is configured, so development machines see
//! the exact text a patient would receive without sending anything.

use crate::error::NotifyError;
use crate::notify::traits::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMailer;

impl Notifier for ConsoleMailer {
    fn name(&self) -> &str {
        "console"
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        eprintln!("----- mail to {to} -----");
        eprintln!("Subject: {subject}");
        eprintln!();
        eprintln!("{body}");
        eprintln!("------------------------");
        Ok(())
    }
}
