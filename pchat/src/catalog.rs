//! Model name to provider and pricing lookup.

use std::collections::HashMap;

use pprovider::{ModelPricing, ProviderId};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntry {
    pub name: String,
    pub provider: ProviderId,
    pub pricing: Option<ModelPricing>,
}

impl ModelEntry {
    pub fn new(name: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            name: name.into(),
            provider,
            pricing: None,
        }
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = Some(pricing);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    entries: HashMap<String, ModelEntry>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, entry: ModelEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn insert(&mut self, entry: ModelEntry) -> Option<ModelEntry> {
        self.entries.insert(entry.name.clone(), entry)
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.get(name)
    }

    pub fn pricing(&self, name: &str) -> Option<&ModelPricing> {
        self.entries.get(name).and_then(|entry| entry.pricing.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.entries.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let catalog = ModelCatalog::new()
            .with_model(
                ModelEntry::new("gpt-4o-mini", ProviderId::OpenAi)
                    .with_pricing(ModelPricing::new(0.15, 0.6)),
            )
            .with_model(ModelEntry::new("llama3.2", ProviderId::Ollama));

        assert_eq!(catalog.names(), vec!["gpt-4o-mini", "llama3.2"]);
        assert_eq!(
            catalog.get("llama3.2").map(|entry| entry.provider),
            Some(ProviderId::Ollama)
        );
        assert!(catalog.pricing("gpt-4o-mini").is_some());
        assert!(catalog.pricing("llama3.2").is_none());
        assert!(catalog.get("missing").is_none());
    }
}
