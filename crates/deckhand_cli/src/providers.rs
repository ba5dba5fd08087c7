use std::sync::Arc;
use std::time::Duration;

use agent_provider::ModelProvider;
use agent_provider_chat_api::{ChatApiProvider, ChatApiProviderConfig, CHAT_API_PROVIDER_ID};
use agent_provider_mock::{MockProvider, MOCK_PROVIDER_ID};
use deckhand::AgentConfig;

/// Builds the model collaborator named by `config.provider`.
pub fn provider_for_config(config: &AgentConfig) -> Result<Arc<dyn ModelProvider>, String> {
    match config.provider.as_str() {
        CHAT_API_PROVIDER_ID => {
            let api_key = config
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    "Provider 'chat-api' needs an API key. Set DECKHAND_API_KEY or OPENAI_API_KEY."
                        .to_string()
                })?;

            let mut provider_config = ChatApiProviderConfig::new(api_key, config.model.clone())
                .with_base_url(config.base_url.clone());
            if let Some(seconds) = config.request_timeout_secs {
                provider_config = provider_config.with_timeout(Duration::from_secs(seconds));
            }

            let provider = ChatApiProvider::new(provider_config).map_err(|error| error.to_string())?;
            Ok(Arc::new(provider))
        }
        MOCK_PROVIDER_ID => Ok(Arc::new(
            MockProvider::default().with_model_id(config.model.clone()),
        )),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {CHAT_API_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        )),
    }
}
