use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use deckhand_core::provider::GenerationProvider;

use crate::anthropic::AnthropicProvider;
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Mock,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

/// Provider selection inputs. `kind` forces a backend; otherwise the first
/// configured API key wins and mock is the fallback of last resort.
#[derive(Default)]
pub struct ProviderConfig {
    pub kind: Option<ProviderKind>,
    pub openai_api_key: Option<SecretString>,
    pub anthropic_api_key: Option<SecretString>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            kind: std::env::var("DECKHAND_PROVIDER")
                .ok()
                .and_then(|v| ProviderKind::parse(&v)),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok().map(SecretString::from),
            openai_model: std::env::var("DECKHAND_OPENAI_MODEL").ok(),
            anthropic_model: std::env::var("DECKHAND_ANTHROPIC_MODEL").ok(),
        }
    }

    fn resolved_kind(&self) -> ProviderKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        if self.openai_api_key.is_some() {
            ProviderKind::OpenAi
        } else if self.anthropic_api_key.is_some() {
            ProviderKind::Anthropic
        } else {
            ProviderKind::Mock
        }
    }
}

/// Build the provider for a job. A forced kind with no key, like any other
/// unusable selection, lands on mock so the pipeline stays runnable.
pub fn create_provider(config: &ProviderConfig) -> Arc<dyn GenerationProvider> {
    match config.resolved_kind() {
        ProviderKind::OpenAi => {
            if let Some(key) = config.openai_api_key.clone() {
                let mut provider = OpenAiProvider::new(key);
                if let Some(model) = &config.openai_model {
                    provider = provider.with_model(model.clone());
                }
                info!(provider = "openai", "generation provider selected");
                return Arc::new(provider);
            }
            info!(provider = "mock", "openai requested but no API key configured");
            Arc::new(MockProvider::generative())
        }
        ProviderKind::Anthropic => {
            if let Some(key) = config.anthropic_api_key.clone() {
                let mut provider = AnthropicProvider::new(key);
                if let Some(model) = &config.anthropic_model {
                    provider = provider.with_model(model.clone());
                }
                info!(provider = "anthropic", "generation provider selected");
                return Arc::new(provider);
            }
            info!(provider = "mock", "anthropic requested but no API key configured");
            Arc::new(MockProvider::generative())
        }
        ProviderKind::Mock => {
            info!(provider = "mock", "generation provider selected");
            Arc::new(MockProvider::generative())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse() {
        assert_eq!(ProviderKind::parse("OpenAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("anthropic"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse("mock"), Some(ProviderKind::Mock));
        assert_eq!(ProviderKind::parse("gemini"), None);
    }

    #[test]
    fn first_configured_key_wins() {
        let config = ProviderConfig {
            openai_api_key: Some(SecretString::from("sk-1")),
            anthropic_api_key: Some(SecretString::from("sk-2")),
            ..Default::default()
        };
        assert_eq!(config.resolved_kind(), ProviderKind::OpenAi);
        assert_eq!(create_provider(&config).name(), "openai");
    }

    #[test]
    fn explicit_kind_overrides_keys() {
        let config = ProviderConfig {
            kind: Some(ProviderKind::Anthropic),
            openai_api_key: Some(SecretString::from("sk-1")),
            anthropic_api_key: Some(SecretString::from("sk-2")),
            ..Default::default()
        };
        assert_eq!(create_provider(&config).name(), "anthropic");
    }

    #[test]
    fn no_keys_means_mock() {
        let config = ProviderConfig::default();
        assert_eq!(create_provider(&config).name(), "mock");
    }

    #[test]
    fn forced_kind_without_key_degrades_to_mock() {
        let config = ProviderConfig {
            kind: Some(ProviderKind::OpenAi),
            ..Default::default()
        };
        assert_eq!(create_provider(&config).name(), "mock");
    }
}
