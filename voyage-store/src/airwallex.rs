use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{error, info, warn};
use voyage_core::{CoreError, CoreResult, CreateIntentRequest, PaymentAdapter, PaymentIntent, PaymentStatus};
use voyage_shared::Masked;

use crate::app_config::PaymentsConfig;

const INITIAL_BACKOFF_MS: u64 = 250;
// Tokens are issued for 30 minutes; refresh a little early.
const TOKEN_LIFETIME: Duration = Duration::from_secs(25 * 60);

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < TOKEN_LIFETIME
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct CreateIntentBody<'a> {
    request_id: &'a str,
    merchant_order_id: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    merchant_order_id: Option<String>,
    amount: Decimal,
    currency: String,
    status: PaymentStatus,
    client_secret: Option<String>,
    created_at: Option<String>,
}

impl From<IntentResponse> for PaymentIntent {
    fn from(body: IntentResponse) -> Self {
        PaymentIntent {
            id: body.id,
            merchant_order_id: body.merchant_order_id,
            amount: body.amount,
            currency: body.currency,
            status: body.status,
            client_secret: body.client_secret,
            created_at: body.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

/// The API emits `2024-01-01T00:00:00+0000`, which is not quite RFC 3339.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Payment Acceptance client: bearer-token login, intent create and lookup.
pub struct AirwallexAdapter {
    client: Client,
    base_url: String,
    client_id: String,
    api_key: Masked<String>,
    max_retries: u32,
    token: RwLock<Option<CachedToken>>,
}

impl AirwallexAdapter {
    pub fn new(config: &PaymentsConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.resolved_base_url().trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            api_key: Masked::new(config.api_key.clone()),
            max_retries: config.max_retries,
            token: RwLock::new(None),
        })
    }

    async fn bearer(&self) -> CoreResult<String> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let mut slot = self.token.write().await;
        // Another task may have logged in while we waited for the lock.
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(format!("{}/api/v1/authentication/login", self.base_url))
            .header("x-client-id", &self.client_id)
            .header("x-api-key", self.api_key.expose())
            .send()
            .await
            .map_err(|e| CoreError::UpstreamError(format!("login request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            error!("Airwallex login rejected with {}", status);
            return Err(CoreError::UpstreamError(format!("login rejected with {}", status)));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| CoreError::UpstreamError(format!("malformed login response: {}", e)))?;
        info!("Obtained Airwallex access token");

        let value = login.token.clone();
        *slot = Some(CachedToken { value: login.token, fetched_at: Instant::now() });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Retries transport errors, 429 and 5xx with exponential backoff. A 401
    /// drops the cached token and retries once with a fresh login.
    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> CoreResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut retries = 0;
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut reauthenticated = false;

        loop {
            let token = self.bearer().await?;
            let mut request = self.client.request(method.clone(), &url).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            error!("Malformed Airwallex response from {}: {}", path, e);
                            CoreError::UpstreamError(format!("malformed response from {}", path))
                        });
                    }

                    if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                        warn!("Airwallex token rejected, logging in again");
                        self.invalidate_token().await;
                        reauthenticated = true;
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    if !(status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS) {
                        error!("Airwallex {} {} failed with {}: {}", method, path, status, text);
                        return Err(CoreError::UpstreamError(format!("{} {} returned {}", method, path, status)));
                    }
                    if retries >= self.max_retries {
                        error!("Airwallex {} {} failed after {} retries: {} {}", method, path, retries, status, text);
                        return Err(CoreError::UpstreamError(format!("{} {} returned {}", method, path, status)));
                    }
                    warn!("Airwallex transient error {}. Retrying in {}ms...", status, backoff);
                }
                Err(e) => {
                    if retries >= self.max_retries {
                        error!("Airwallex network error after {} retries: {}", retries, e);
                        return Err(CoreError::UpstreamError(format!("network error: {}", e)));
                    }
                    warn!("Airwallex network error. Retrying in {}ms... {}", backoff, e);
                }
            }

            sleep(Duration::from_millis(backoff)).await;
            retries += 1;
            backoff *= 2;
        }
    }
}

#[async_trait]
impl PaymentAdapter for AirwallexAdapter {
    fn provider(&self) -> &'static str {
        "airwallex"
    }

    async fn create_intent(&self, request: &CreateIntentRequest) -> CoreResult<PaymentIntent> {
        let body = CreateIntentBody {
            request_id: &request.request_id,
            merchant_order_id: &request.merchant_order_id,
            amount: request.amount,
            currency: &request.currency,
            metadata: &request.metadata,
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| CoreError::InternalError(format!("could not encode intent request: {}", e)))?;

        let intent: IntentResponse = self
            .send_with_retry(Method::POST, "/api/v1/pa/payment_intents/create", Some(&body))
            .await?;
        Ok(intent.into())
    }

    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent> {
        if intent_id.is_empty() || !intent_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(CoreError::validation(format!("Invalid payment intent id: {}", intent_id)));
        }
        let intent: IntentResponse = self
            .send_with_retry(Method::GET, &format!("/api/v1/pa/payment_intents/{}", intent_id), None)
            .await?;
        Ok(intent.into())
    }
}

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature headers")]
    Missing,
    #[error("malformed timestamp")]
    MalformedTimestamp,
    #[error("timestamp outside tolerance")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

/// Checks `x-signature == hex(HMAC-SHA256(secret, x-timestamp || body))`.
pub struct WebhookVerifier {
    secret: Masked<String>,
    tolerance_ms: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_seconds: i64) -> Self {
        Self {
            secret: Masked::new(secret.into()),
            tolerance_ms: tolerance_seconds.saturating_mul(1000),
        }
    }

    pub fn verify(&self, timestamp: &str, signature: &str, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(Utc::now().timestamp_millis(), timestamp, signature, body)
    }

    pub fn verify_at(
        &self,
        now_ms: i64,
        timestamp: &str,
        signature: &str,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.trim();
        let signature = signature.trim();
        if timestamp.is_empty() || signature.is_empty() {
            return Err(SignatureError::Missing);
        }

        let raw: i64 = timestamp.parse().map_err(|_| SignatureError::MalformedTimestamp)?;
        // Milliseconds are expected; tolerate senders that use seconds.
        let sent_ms = if raw < 1_000_000_000_000 { raw.saturating_mul(1000) } else { raw };
        if (now_ms - sent_ms).abs() > self.tolerance_ms {
            return Err(SignatureError::Stale);
        }

        let expected = hex::decode(signature).map_err(|_| SignatureError::Mismatch)?;
        self.mac(timestamp, body)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        hex::encode(self.mac(timestamp, body).finalize().into_bytes())
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.expose().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(body);
        mac
    }
}
