//! Component registry seam.
//!
//! The host owns the catalogue of components. The engine only asks it two
//! things: what props a fresh block starts with, and whether a block of a
//! given component may contain other blocks.

use std::collections::HashMap;

use crate::block::Props;

pub trait ComponentRegistry: Send + Sync {
    /// Props a newly added block of this component starts with
    fn default_props(&self, component_name: &str) -> Props;

    /// Whether blocks of this component may have children
    fn can_have_children(&self, component_name: &str) -> bool;
}

/// Registry that knows nothing: no default props, every block is a container
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegistry;

impl ComponentRegistry for EmptyRegistry {
    fn default_props(&self, _component_name: &str) -> Props {
        Props::new()
    }

    fn can_have_children(&self, _component_name: &str) -> bool {
        true
    }
}

/// Registry entry for one component
#[derive(Debug, Clone, Default)]
pub struct ComponentSpec {
    pub default_props: Props,
    pub can_have_children: bool,
}

impl ComponentSpec {
    pub fn leaf() -> Self {
        Self::default()
    }

    pub fn container() -> Self {
        Self {
            can_have_children: true,
            ..Self::default()
        }
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.default_props.insert(key.into(), value.into());
        self
    }
}

/// Map-backed registry. Unknown components get no props and no children.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    components: HashMap<String, ComponentSpec>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, spec: ComponentSpec) {
        self.components.insert(name.into(), spec);
    }

    pub fn with_component(mut self, name: impl Into<String>, spec: ComponentSpec) -> Self {
        self.register(name, spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.get(name)
    }
}

impl ComponentRegistry for StaticRegistry {
    fn default_props(&self, component_name: &str) -> Props {
        self.components
            .get(component_name)
            .map(|spec| spec.default_props.clone())
            .unwrap_or_default()
    }

    fn can_have_children(&self, component_name: &str) -> bool {
        self.components
            .get(component_name)
            .is_some_and(|spec| spec.can_have_children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_registry() {
        let registry = StaticRegistry::new()
            .with_component("text", ComponentSpec::leaf().with_default("text", "Lorem ipsum"))
            .with_component("section", ComponentSpec::container());

        assert_eq!(registry.default_props("text")["text"], json!("Lorem ipsum"));
        assert!(registry.default_props("section").is_empty());
        assert!(registry.can_have_children("section"));
        assert!(!registry.can_have_children("text"));
        assert!(!registry.can_have_children("unknown"));

        assert!(registry.get("section").is_some_and(|spec| spec.can_have_children));
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_empty_registry_allows_everything() {
        assert!(EmptyRegistry.can_have_children("anything"));
        assert!(EmptyRegistry.default_props("anything").is_empty());
    }
}
