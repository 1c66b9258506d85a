//! Node factories keyed by type name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Node;
use crate::error::{Error, Result};
use crate::nodes::{Branch, ForLoop, Parameter, Sequence, Start};

/// Creates a fresh, default-configured node.
pub type NodeFactory = Arc<dyn Fn() -> Box<dyn Node> + Send + Sync>;

/// Registry of node factories used to rebuild nodes by type name.
///
/// Document loading and subgraph cloning both go through the registry, so
/// every node type that appears in a persisted graph must be registered.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in control nodes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register::<Start>()
            .register::<Branch>()
            .register::<ForLoop>()
            .register::<Sequence>()
            .register::<Parameter>();
        registry
    }

    /// Registers `N` under its own type name.
    pub fn register<N: Node + Default>(&mut self) -> &mut Self {
        let type_name = N::default().type_name();
        self.register_with(type_name, || Box::new(N::default()))
    }

    /// Registers a factory under an explicit type name.
    ///
    /// A later registration for the same name replaces the earlier one.
    pub fn register_with(
        &mut self,
        type_name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Node> + Send + Sync + 'static,
    ) -> &mut Self {
        self.factories.insert(type_name.into(), Arc::new(factory));
        self
    }

    /// Returns whether a factory exists for `type_name`.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Returns the registered type names in sorted order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Creates a node of type `type_name`.
    pub fn create(&self, type_name: &str) -> Result<Box<dyn Node>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| Error::UnknownNodeType(type_name.to_owned()))?;
        Ok(factory())
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = NodeRegistry::with_builtins();
        for name in ["start", "branch", "for_loop", "sequence", "parameter"] {
            assert!(registry.contains(name), "missing {name}");
        }

        let node = registry.create("branch").unwrap();
        assert_eq!(node.type_name(), "branch");
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let registry = NodeRegistry::new();
        assert!(matches!(
            registry.create("nope"),
            Err(Error::UnknownNodeType(name)) if name == "nope"
        ));
    }
}
