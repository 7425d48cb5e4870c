//! Layered visibility of parameter resolvers.
//!
//! Extensions registered on a container are visible to everything inside it; extensions registered on a test are
//! visible only to that test. Instead of inheritance, each scope pushes an explicit layer onto a copy of the
//! enclosing registry. Layers are composed outer layer first, and the engine's built-in layer always comes last
//! (lowest priority).

use std::sync::Arc;

use super::resolver::{ParameterResolver, TestInfoParameterResolver};

#[derive(Clone)]
struct ExtensionLayer {
    scope: String,
    resolvers: Vec<Arc<dyn ParameterResolver>>,
}

/// Ordered stack of resolver layers visible at one scope.
#[derive(Clone)]
pub struct ExtensionRegistry {
    layers: Vec<ExtensionLayer>,
    builtins: Vec<Arc<dyn ParameterResolver>>,
}

impl ExtensionRegistry {
    /// Registry holding only the engine's built-in resolvers.
    pub fn with_builtins() -> Self {
        Self {
            layers: Vec::new(),
            builtins: vec![Arc::new(TestInfoParameterResolver)],
        }
    }

    /// Registry with no resolvers at all.
    pub fn empty() -> Self {
        Self {
            layers: Vec::new(),
            builtins: Vec::new(),
        }
    }

    /// A copy of `self` with one more (inner) layer.
    ///
    /// A resolver whose name is already registered in an enclosing layer is not registered again, so registering the
    /// same extension on a container and on one of its tests does not make it compete with itself. Built-ins do not
    /// take part in this check: a user resolver sharing a built-in's name still competes with it.
    #[must_use]
    pub fn child<I>(&self, scope: impl Into<String>, resolvers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ParameterResolver>>,
    {
        let scope = scope.into();
        let mut layer = ExtensionLayer {
            scope,
            resolvers: Vec::new(),
        };
        for resolver in resolvers {
            let name = resolver.name();
            let registered = self.is_registered(name) || layer.resolvers.iter().any(|r| r.name() == name);
            if registered {
                tracing::trace!(resolver = name, scope = %layer.scope, "resolver already registered; skipped");
                continue;
            }
            layer.resolvers.push(resolver);
        }

        let mut next = self.clone();
        if !layer.resolvers.is_empty() {
            next.layers.push(layer);
        }
        next
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.visible().any(|r| r.name() == name)
    }

    /// Whether a user layer already holds a resolver called `name`.
    fn is_registered(&self, name: &str) -> bool {
        self.layers
            .iter()
            .flat_map(|layer| layer.resolvers.iter())
            .any(|r| r.name() == name)
    }

    /// Every visible resolver: outer layers first, built-ins last.
    pub fn visible(&self) -> impl Iterator<Item = &Arc<dyn ParameterResolver>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.resolvers.iter())
            .chain(self.builtins.iter())
    }

    /// Scope labels of the user layers, outer first.
    pub fn scopes(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.scope.as_str()).collect()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.visible().map(|r| r.name()).collect();
        f.debug_struct("ExtensionRegistry")
            .field("scopes", &self.scopes())
            .field("visible", &names)
            .finish()
    }
}
