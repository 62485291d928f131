use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use deckhand_core::errors::ProviderError;
use deckhand_core::provider::{GenerationProvider, GenerationRequest};
use deckhand_core::units::SlidePayload;

use crate::fallback::{align_with_manifest, fallback_slides};
use crate::parse::{extract_json, payloads_from_value};
use crate::prompt::{build_slide_prompt, SLIDE_SYSTEM_PROMPT};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat-completions provider. Degrades to fallback payloads (with a
/// warning) when the model reply cannot be decoded into slides.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    warnings: Mutex<Vec<String>>,
}

impl OpenAiProvider {
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

    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": 0.2,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
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

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidResponse("no message content in reply".into()))
    }
}

pub(crate) fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(REQUEST_TIMEOUT)
    } else {
        ProviderError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_slides(
        &self,
        req: &GenerationRequest,
    ) -> Result<Vec<SlidePayload>, ProviderError> {
        let user = build_slide_prompt(req);
        let reply = self.chat(SLIDE_SYSTEM_PROMPT, &user, 4096).await?;
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
        self.chat(system_prompt, user_prompt, max_tokens).await
    }

    fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock())
    }
}
