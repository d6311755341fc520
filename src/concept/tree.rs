use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One concept in the exploration tree.
///
/// Children are reference counted so that a rewrite only copies the path to the
/// changed node and every untouched subtree stays shared with the previous tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<ConceptNode>>,
}

impl ConceptNode {
    #[cfg(test)]
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            children: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_children(name: impl Into<String>, children: Vec<ConceptNode>) -> Self {
        Self {
            name: name.into(),
            value: None,
            children: children.into_iter().map(Arc::new).collect(),
        }
    }

    /// Unnamed root shown before the first expansion has returned.
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of edges on the longest root-to-leaf path; a lone root is 0.
    pub fn height(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.height() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| child.node_count())
            .sum::<usize>()
    }

    /// First node named `name` in depth-first pre-order.
    pub fn find(&self, name: &str) -> Option<&ConceptNode> {
        if self.name == name {
            return Some(self);
        }

        self.children.iter().find_map(|child| child.find(name))
    }

    /// Cleans up a tree produced by the model: names are trimmed, empty or
    /// duplicate sibling names are dropped and unusable weights are removed.
    pub fn sanitized(&self) -> ConceptNode {
        let mut seen = HashSet::new();
        let children = self
            .children
            .iter()
            .filter_map(|child| {
                let name = child.name.trim();
                if name.is_empty() || !seen.insert(name.to_owned()) {
                    return None;
                }
                let mut clean = child.sanitized();
                clean.name = name.to_owned();
                Some(Arc::new(clean))
            })
            .collect();

        ConceptNode {
            name: self.name.trim().to_owned(),
            value: self.value.filter(|value| value.is_finite() && *value >= 0.0),
            children,
        }
    }
}
