pub mod digest_template;
pub mod email;

use async_trait::async_trait;

pub use digest_template::{DigestParams, DigestRenderer};
pub use email::SmtpMailer;

/// Outbound mail seam. `Ok(false)` means the message was deliberately
/// not sent (for example no SMTP credentials are configured); errors
/// mean delivery was attempted and failed.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<bool>;
}
