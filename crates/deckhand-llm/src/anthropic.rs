use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use deckhand_core::errors::ProviderError;
use deckhand_core::provider::{GenerationProvider, GenerationRequest};
use deckhand_core::units::SlidePayload;

use crate::fallback::{align_with_manifest, fallback_slides};
use crate::openai::map_transport_error;
use crate::parse::{extract_json, payloads_from_value};
use crate::prompt::{build_slide_prompt, SLIDE_SYSTEM_PROMPT};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Messages-API provider. Same degradation contract as the OpenAI one:
/// undecodable replies become fallback payloads plus a warning.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    warnings: Mutex<Vec<String>>,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("deckhand/0.1")
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn warn(&self, warning: String) {
        self.warnings.lock().push(warning);
    }

    async fn message(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("bad response body: {e}")))?;

        body["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidResponse("no text block in reply".into()))
    }
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate_slides(
        &self,
        req: &GenerationRequest,
    ) -> Result<Vec<SlidePayload>, ProviderError> {
        let user = build_slide_prompt(req);
        let reply = self.message(SLIDE_SYSTEM_PROMPT, &user, 4096).await?;
        let seed = req.thesis.as_deref().unwrap_or(&req.prompt);

        let decoded = extract_json(&reply)
            .and_then(|value| payloads_from_value(&value, &req.manifest.slides));
        let payloads = match decoded {
            Some(payloads) => payloads,
            None => {
                debug!(model = %self.model, "reply was not decodable slide JSON");
                self.warn("fallback payloads substituted: model reply was not valid slide JSON".into());
                return Ok(fallback_slides(&req.manifest, seed));
            }
        };

        let (aligned, backfilled) = align_with_manifest(payloads, &req.manifest, seed);
        for index in backfilled {
            self.warn(format!("fallback payload substituted for slide {index}"));
        }
        Ok(aligned)
    }

    async fn generate_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        self.message(system_prompt, user_prompt, max_tokens).await
    }

    fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock())
    }
}
