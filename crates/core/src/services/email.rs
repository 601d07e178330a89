//! Email transport.

use admissions_common::{
    AppError, AppResult,
    config::{NotificationSettings, SmtpSettings},
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};

/// Email service.
///
/// Without an SMTP relay configured, messages are logged and reported as
/// delivered.
#[derive(Clone)]
pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    portal_name: String,
    portal_url: String,
}

impl EmailService {
    /// Create a new email service.
    pub fn new(settings: &NotificationSettings, portal_url: &str) -> AppResult<Self> {
        let from = format!("{} <{}>", settings.portal_name, settings.from_address)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid sender address: {e}")))?;

        let transport = settings.smtp.as_ref().map(build_transport).transpose()?;

        Ok(Self {
            transport,
            from,
            portal_name: settings.portal_name.clone(),
            portal_url: portal_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check if an SMTP relay is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Public URL of the portal.
    #[must_use]
    pub fn portal_url(&self) -> &str {
        &self.portal_url
    }

    /// Send a plain-text message, with an HTML alternative.
    pub async fn send(&self, to: &str, subject: &str, text: &str) -> AppResult<()> {
        let message = self.build_message(to, subject, text)?;

        let Some(transport) = &self.transport else {
            tracing::info!(to = %to, subject = %subject, "SMTP not configured, email logged only");
            return Ok(());
        };

        transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP delivery failed: {e}")))?;

        tracing::debug!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }

    fn build_message(&self, to: &str, subject: &str, text: &str) -> AppResult<Message> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|_| AppError::Validation(format!("Invalid email address: {to}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                self.wrap_html(text),
            ))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))
    }

    fn wrap_html(&self, text: &str) -> String {
        let paragraphs: String = text
            .split("\n\n")
            .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
        a {{ color: #1a5fb4; }}
    </style>
</head>
<body>
    {paragraphs}
    <hr style="margin-top: 40px; border: none; border-top: 1px solid #e9ecef;">
    <p style="font-size: 12px; color: #6c757d;">
        This email was sent by <a href="{url}">{name}</a>.
    </p>
</body>
</html>"#,
            url = self.portal_url,
            name = escape_html(&self.portal_name),
        )
    }
}

fn build_transport(smtp: &SmtpSettings) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        .map_err(|e| AppError::Config(format!("Invalid SMTP relay {}: {e}", smtp.host)))?
        .port(smtp.port);

    if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.build())
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
