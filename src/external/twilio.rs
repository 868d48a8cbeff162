use crate::config::TwilioConfig;
use crate::error::{AppError, AppResult};
use crate::external::SmsSender;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

#[derive(Debug, Deserialize)]
pub struct SendSmsResponse {
    pub sid: String,
    pub status: String,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct TwilioService {
    client: Client,
    config: TwilioConfig,
}

impl TwilioService {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioService {
    async fn send(&self, to: &str, body: &str) -> AppResult<()> {
        let params = [("To", to), ("From", &self.config.from_phone), ("Body", body)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            let sent: SendSmsResponse = response.json().await?;
            log::info!("SMS queued to {to}: sid={} status={}", sent.sid, sent.status);
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("SMS to {to} failed to send: {error_text}");
            Err(AppError::ExternalApiError(format!(
                "SMS sending failed: {error_text}"
            )))
        }
    }
}

/// Checks the `X-Twilio-Signature` header of inbound webhooks.
///
/// The signature is base64(HMAC-SHA1(auth_token, url + k1 + v1 + k2 + v2 ...))
/// with the POST parameters sorted by key, then value.
#[derive(Clone)]
pub struct TwilioRequestValidator {
    auth_token: String,
}

impl TwilioRequestValidator {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
        }
    }

    fn mac_for(&self, url: &str, params: &[(String, String)]) -> AppResult<HmacSha1> {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();

        let mut mac = HmacSha1::new_from_slice(self.auth_token.as_bytes())
            .map_err(|e| AppError::InternalError(format!("HMAC key rejected: {e}")))?;
        mac.update(url.as_bytes());
        for (key, value) in sorted {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        Ok(mac)
    }

    pub fn compute_signature(&self, url: &str, params: &[(String, String)]) -> AppResult<String> {
        let mac = self.mac_for(url, params)?;
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Constant-time comparison of `signature` against the expected value.
    pub fn validate(&self, url: &str, params: &[(String, String)], signature: &str) -> bool {
        if self.auth_token.is_empty() {
            return false;
        }
        let Ok(provided) = BASE64.decode(signature.trim()) else {
            return false;
        };
        match self.mac_for(url, params) {
            Ok(mac) => mac.verify_slice(&provided).is_ok(),
            Err(_) => false,
        }
    }
}
