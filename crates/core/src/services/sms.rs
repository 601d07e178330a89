//! SMS transport over a Twilio-compatible HTTP gateway.

use admissions_common::{AppError, AppResult, config::SmsSettings};

/// SMS service.
#[derive(Clone)]
pub struct SmsService {
    settings: Option<SmsSettings>,
    http_client: reqwest::Client,
}

impl SmsService {
    /// Create a new SMS service.
    #[must_use]
    pub fn new(settings: Option<SmsSettings>) -> Self {
        Self {
            settings,
            http_client: reqwest::Client::new(),
        }
    }

    /// Check if a gateway is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.settings.is_some()
    }

    /// Send `body` to the phone number `to`.
    pub async fn send(&self, to: &str, body: &str) -> AppResult<()> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| AppError::ExternalService("SMS gateway not configured".to_string()))?;

        let response = self
            .http_client
            .post(messages_url(settings))
            .basic_auth(&settings.account_sid, Some(&settings.auth_token))
            .form(&[
                ("To", to),
                ("From", settings.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("SMS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "SMS gateway returned {status}: {text}"
            )));
        }

        tracing::debug!(to = %to, "SMS sent");
        Ok(())
    }
}

fn messages_url(settings: &SmsSettings) -> String {
    format!(
        "{}/2010-04-01/Accounts/{}/Messages.json",
        settings.api_base.trim_end_matches('/'),
        settings.account_sid
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        let settings = SmsSettings {
            api_base: "https://api.twilio.com/".to_string(),
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15550000000".to_string(),
        };

        assert_eq!(
            messages_url(&settings),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn test_send_without_gateway_fails() {
        let service = SmsService::new(None);
        assert!(!service.is_enabled());

        let err = service.send("+256700000001", "Hello").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalService(_)));
    }
}
