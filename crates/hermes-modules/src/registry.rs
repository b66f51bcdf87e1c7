//! Command name → module lookup.

use crate::builtins::{HelpModule, PingModule, SearchModule};
use hermes_core::config::ModulesConfig;
use hermes_core::error::HermesError;
use hermes_core::traits::Module;
use hermes_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// What `help` shows for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSummary {
    pub name: String,
    pub usage: String,
    pub description: String,
    pub aliases: Vec<String>,
}

/// Registered modules, addressable by name or alias.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
    index: HashMap<String, usize>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in modules, minus any listed in `config.disabled`.
    ///
    /// `help` goes last so its listing covers everything registered.
    pub fn with_builtins(store: Store, config: &ModulesConfig) -> Result<Self, HermesError> {
        let mut registry = Self::new();
        let enabled = |name: &str| !config.disabled.iter().any(|d| d.eq_ignore_ascii_case(name));

        if enabled("ping") {
            registry.register(Arc::new(PingModule))?;
        }
        if enabled("search") {
            registry.register(Arc::new(SearchModule::new(store)))?;
        }
        if enabled("help") {
            let help = HelpModule::new(config.prefix.clone(), registry.summaries());
            registry.register(Arc::new(help))?;
        }

        info!("modules loaded: {}", registry.names().join(", "));
        Ok(registry)
    }

    /// Add a module. Fails if its name or an alias is already taken.
    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<(), HermesError> {
        let keys: Vec<String> = std::iter::once(module.name())
            .chain(module.aliases().iter().copied())
            .map(str::to_lowercase)
            .collect();

        for key in &keys {
            if self.index.contains_key(key) {
                return Err(HermesError::Module(format!(
                    "command '{key}' already registered"
                )));
            }
        }

        let slot = self.modules.len();
        self.modules.push(module);
        for key in keys {
            self.index.insert(key, slot);
        }
        Ok(())
    }

    /// Look up by lowercase name or alias.
    pub fn get(&self, command: &str) -> Option<Arc<dyn Module>> {
        self.index.get(command).map(|&i| self.modules[i].clone())
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn summaries(&self) -> Vec<CommandSummary> {
        self.modules
            .iter()
            .map(|m| CommandSummary {
                name: m.name().to_string(),
                usage: m.usage().to_string(),
                description: m.description().to_string(),
                aliases: m.aliases().iter().map(|a| a.to_string()).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
