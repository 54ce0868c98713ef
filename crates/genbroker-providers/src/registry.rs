//! Provider registry keyed by validated model.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use genbroker_models::ModelKind;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{FlashImageProvider, GenerationProvider, ImagenProvider, VeoProvider};

/// Registry for generation providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ModelKind, Arc<dyn GenerationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider.
    pub fn from_config(config: &ProviderConfig, http: Client) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ImagenProvider::new(http.clone(), config)));
        registry.register(Arc::new(FlashImageProvider::new(http.clone(), config)));
        registry.register(Arc::new(VeoProvider::new(http, config)));
        registry
    }

    /// Register a provider under the model it serves, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn GenerationProvider>) {
        debug!(model = %provider.model(), provider = provider.name(), "Registered provider");
        self.providers.insert(provider.model(), provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Get the provider for a model.
    pub fn get(&self, model: ModelKind) -> ProviderResult<Arc<dyn GenerationProvider>> {
        self.providers
            .get(&model)
            .cloned()
            .ok_or_else(|| ProviderError::configuration(format!("No provider registered for {}", model)))
    }

    pub fn models(&self) -> Vec<ModelKind> {
        let mut models: Vec<_> = self.providers.keys().copied().collect();
        models.sort_by_key(|m| m.as_str());
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_registers_every_model() {
        let registry = ProviderRegistry::from_config(&ProviderConfig::default(), Client::new());
        for model in ModelKind::all() {
            let provider = registry.get(model).unwrap();
            assert_eq!(provider.model(), model);
        }
        assert_eq!(registry.models().len(), 3);
    }

    #[test]
    fn test_missing_provider_is_configuration_error() {
        let registry = ProviderRegistry::new();
        let err = registry.get(ModelKind::Veo).err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
