//! Language Router (C3): maps a lowercase file extension to a parser via a
//! language id, in both directions. Pure configuration — registration never
//! performs I/O or touches a parser's internal state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::parsing::plugin::{LanguageId, LanguagePlugin};

enum Registration {
    Ready(Arc<dyn LanguagePlugin>),
    Factory(Arc<dyn Fn() -> Arc<dyn LanguagePlugin> + Send + Sync>),
}

impl Registration {
    fn resolve(&self) -> Arc<dyn LanguagePlugin> {
        match self {
            Registration::Ready(plugin) => plugin.clone(),
            Registration::Factory(factory) => factory(),
        }
    }
}

/// Registry mapping extensions and language ids to parser plugins.
#[derive(Default)]
pub struct LanguageRegistry {
    by_extension: HashMap<String, LanguageId>,
    by_language: HashMap<LanguageId, Registration>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready-to-use parser under its declared extensions.
    pub fn register(&mut self, plugin: Arc<dyn LanguagePlugin>) {
        let id = plugin.language_id();
        for ext in plugin.extensions() {
            self.by_extension.insert(ext.to_lowercase(), id);
        }
        self.by_language.insert(id, Registration::Ready(plugin));
    }

    /// Registers a lazy factory instead of an already-constructed parser.
    pub fn register_factory(
        &mut self,
        id: LanguageId,
        extensions: &[&str],
        factory: impl Fn() -> Arc<dyn LanguagePlugin> + Send + Sync + 'static,
    ) {
        for ext in extensions {
            self.by_extension.insert(ext.to_lowercase(), id);
        }
        self.by_language.insert(id, Registration::Factory(Arc::new(factory)));
    }

    /// Returns the parser for a file extension (without the leading dot),
    /// or `None` if no language claims it.
    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn LanguagePlugin>> {
        let id = self.by_extension.get(&extension.to_lowercase())?;
        self.by_language.get(id).map(Registration::resolve)
    }

    /// Returns the parser for a language id directly, regardless of which
    /// extension dispatched to it — the reverse index spec.md requires.
    pub fn for_language(&self, id: LanguageId) -> Option<Arc<dyn LanguagePlugin>> {
        self.by_language.get(&id).map(Registration::resolve)
    }

    pub fn for_path(&self, path: &std::path::Path) -> Option<Arc<dyn LanguagePlugin>> {
        let ext = path.extension()?.to_str()?;
        self.for_extension(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{python::PythonPlugin, rust_lang::RustPlugin, typescript::TypeScriptPlugin};

    fn registry() -> LanguageRegistry {
        let mut registry = LanguageRegistry::new();
        registry.register(Arc::new(TypeScriptPlugin::new()));
        registry.register(Arc::new(PythonPlugin::new()));
        registry.register(Arc::new(RustPlugin::new()));
        registry
    }

    #[test]
    fn dispatches_by_extension_case_insensitively() {
        let registry = registry();
        assert!(registry.for_extension("TS").is_some());
        assert!(registry.for_extension("py").is_some());
        assert!(registry.for_extension("rs").is_some());
    }

    #[test]
    fn returns_none_for_unregistered_extension() {
        let registry = registry();
        assert!(registry.for_extension("go").is_none());
    }

    #[test]
    fn reverse_index_resolves_from_language_id() {
        let registry = registry();
        let plugin = registry.for_language(LanguageId::Python).unwrap();
        assert_eq!(plugin.language_id(), LanguageId::Python);
    }
}
