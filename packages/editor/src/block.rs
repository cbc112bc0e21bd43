//! # Blocks
//!
//! A block is one placed, configured component instance on a page. Blocks
//! form a tree through `parent_id`, but are stored flat; see [`BlockStore`].
//!
//! [`BlockStore`]: crate::BlockStore

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Component props: unordered, string-keyed, arbitrary JSON values
pub type Props = Map<String, Value>;

/// Opaque block identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One node in the page tree. This is also the persisted shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,

    /// Key into the host's component registry (never dereferenced here)
    pub component_name: String,

    #[serde(default)]
    pub props: Props,

    /// `None` means root level
    #[serde(default)]
    pub parent_id: Option<BlockId>,

    /// Position among siblings, dense `0..n-1`
    #[serde(default)]
    pub sort_order: u32,

    #[serde(default = "default_visible")]
    pub is_visible: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_classes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl Block {
    /// Create a visible root-level block with no props
    pub fn new(id: impl Into<BlockId>, component_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component_name: component_name.into(),
            props: Props::new(),
            parent_id: None,
            sort_order: 0,
            is_visible: true,
            custom_classes: None,
            custom_css: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<BlockId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: u32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Shallow merge: incoming keys overwrite, others are untouched
    pub fn merge_props(&mut self, props: &Props) {
        for (key, value) in props {
            self.props.insert(key.clone(), value.clone());
        }
    }

    /// Merge top-level fields. `props` merges rather than replaces.
    pub fn apply_patch(&mut self, patch: &BlockPatch) {
        if let Some(name) = &patch.component_name {
            self.component_name = name.clone();
        }
        if let Some(props) = &patch.props {
            self.merge_props(props);
        }
        if let Some(visible) = patch.is_visible {
            self.is_visible = visible;
        }
        if let Some(classes) = &patch.custom_classes {
            self.custom_classes = Some(classes.clone());
        }
        if let Some(css) = &patch.custom_css {
            self.custom_css = Some(css.clone());
        }
    }
}

/// Partial update of a block's non-structural fields.
///
/// Identity and position (`id`, `parent_id`, `sort_order`) only change
/// through structural mutations, so they have no place here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<Props>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_classes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
}
