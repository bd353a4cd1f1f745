use crate::backup::provider::{Provider, ProviderBuilder, ProviderConfig};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// Providers available to the orchestrator, in registration order
///
/// Names are unique: the first provider registered under a name wins and
/// later registrations with that name are ignored. Registration is expected
/// to finish before any backup runs, so there is no locking.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and registers every configured provider.
    ///
    /// A provider that fails to initialise is logged and left out; targets
    /// pointing at it fail later with an unknown-provider error.
    pub fn from_configs(configs: &BTreeMap<String, ProviderConfig>) -> Self {
        let mut registry = Self::new();
        for (name, config) in configs {
            match config.build_provider(name) {
                Ok(provider) => {
                    registry.register(provider);
                }
                Err(e) => tracing::error!("Failed to create provider {:?}: {e}", name),
            }
        }
        registry
    }

    /// Adds `provider` unless its name is already taken. Returns whether it
    /// was added.
    pub fn register(&mut self, provider: Box<dyn Provider>) -> bool {
        if self.has(provider.name()) {
            tracing::debug!(
                "Provider {:?} already registered, ignoring duplicate",
                provider.name()
            );
            return false;
        }
        tracing::debug!("Registered provider {:?}", provider.name());
        self.providers.push(provider);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn Provider> {
        self.providers.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.all().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
