use crate::EmailTransport;
use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP mailer. Without credentials it degrades to a logged no-op so a
/// check-only deployment runs without a mail account.
pub struct SmtpMailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl SmtpMailer {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self> {
        let transport = match (username, password) {
            (Some(user), Some(pass)) if !smtp_host.is_empty() => {
                let builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
                    .port(smtp_port)
                    .credentials(Credentials::new(user.to_string(), pass.to_string()));
                Some(builder.build())
            }
            _ => {
                tracing::warn!("SMTP credentials not configured, email delivery disabled");
                None
            }
        };

        Ok(Self {
            transport,
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<bool> {
        let Some(transport) = &self.transport else {
            tracing::info!(recipient = %to, "Skipping email, no SMTP transport");
            return Ok(false);
        };

        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        let mut last_err = None;
        for attempt in 0..3 {
            match transport.send(email.clone()).await {
                Ok(_) => {
                    tracing::info!(recipient = %to, "Email sent");
                    return Ok(true);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %to,
                        error = %e,
                        "Email send failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt < 2 {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            100 * 2u64.pow(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        let e = last_err.map(anyhow::Error::from).unwrap_or_else(|| {
            anyhow::anyhow!("email send failed without a transport error")
        });
        tracing::error!(recipient = %to, error = %e, "Email send failed after 3 retries");
        Err(e)
    }
}
