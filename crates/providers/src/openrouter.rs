//! OpenRouter chat-completions client.
//!
//! Sends the full turn list of one user to `/chat/completions` together with
//! provider-routing preferences that pin requests to free-tier routing, and
//! returns the first choice's text.
//!
//! Failure mapping:
//! - transport errors, timeouts and non-2xx statuses are request failures
//! - a 2xx body carrying `error.message`, no choices, or invalid JSON is a
//!   response failure

use std::time::Duration;

use async_trait::async_trait;
use chatrelay_core::error::ProviderError;
use chatrelay_core::message::{Role, Turn};
use chatrelay_core::Provider;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Upstream provider requests are routed to first.
pub const PREFERRED_PROVIDER: &str = "DeepSeek";

// Attribution headers recommended by OpenRouter.
const REFERER: &str = "https://github.com/chatrelay/chatrelay";
const TITLE: &str = "Telegram Bot";

/// Provider-routing block sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingPreferences {
    pub allow_fallbacks: bool,
    pub order: Vec<String>,
    pub max_price: MaxPrice,
    pub require_parameters: bool,
}

/// Price ceiling per token, in USD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaxPrice {
    pub prompt: f64,
    pub completion: f64,
}

impl RoutingPreferences {
    /// Fallbacks allowed, parameters required, [`PREFERRED_PROVIDER`] first,
    /// and a zero price ceiling so only free endpoints are used.
    pub fn free_tier() -> Self {
        Self {
            allow_fallbacks: true,
            order: vec![PREFERRED_PROVIDER.to_string()],
            max_price: MaxPrice {
                prompt: 0.0,
                completion: 0.0,
            },
            require_parameters: true,
        }
    }
}

impl Default for RoutingPreferences {
    fn default() -> Self {
        Self::free_tier()
    }
}

/// OpenRouter completion provider.
pub struct OpenRouterProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    routing: RoutingPreferences,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    /// Create a provider for `model` against the public OpenRouter API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "openrouter".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 60,
            routing: RoutingPreferences::free_tier(),
            client,
        })
    }

    /// Point the client at another OpenRouter-compatible root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whole-request timeout for each completion call.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn with_routing(mut self, routing: RoutingPreferences) -> Self {
        self.routing = routing;
        self
    }

    fn build_request<'a>(&'a self, history: &'a [Turn]) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            messages: history
                .iter()
                .map(|turn| ApiMessage {
                    role: turn.role(),
                    content: turn.content(),
                })
                .collect(),
            provider: &self.routing,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, history: &[Turn]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(history);

        debug!(
            provider = %self.name,
            model = %self.model,
            turns = history.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: remote_error_message(&error_body).unwrap_or(error_body),
            });
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_completion(&text)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/auth/key", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Ok(response.status().is_success())
    }
}

/// Turn a 2xx response body into the reply text.
fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    if let Some(error) = response.error.filter(|e| !e.message.is_empty()) {
        return Err(ProviderError::Remote(error.message));
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::NoChoices)?;

    Ok(choice.message.content.unwrap_or_default())
}

/// Pull `error.message` out of an error body, if it has one.
fn remote_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
}

// --- OpenRouter API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    provider: &'a RoutingPreferences,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: ApiChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}
