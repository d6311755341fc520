use std::sync::Arc;

use super::tree::ConceptNode;

/// How fetched children are combined with the ones a node already has.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MergePolicy {
    #[default]
    Replace,
    Append,
}

impl MergePolicy {
    pub fn label(self) -> &'static str {
        match self {
            Self::Replace => "replace children",
            Self::Append => "append children",
        }
    }

    fn combine(
        self,
        existing: &[Arc<ConceptNode>],
        incoming: &[Arc<ConceptNode>],
    ) -> Vec<Arc<ConceptNode>> {
        match self {
            Self::Replace => incoming.to_vec(),
            Self::Append => {
                let mut children = existing.to_vec();
                for child in incoming {
                    if !children.iter().any(|current| current.name == child.name) {
                        children.push(Arc::clone(child));
                    }
                }
                children
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum MergeOutcome {
    Merged(Arc<ConceptNode>),
    TargetNotFound,
}

/// Returns a new tree where the first node named `target` (depth-first) has its
/// children combined with `children` according to `policy`. The input tree is
/// never modified and subtrees off the rewritten path are shared.
pub fn merge_children(
    tree: &Arc<ConceptNode>,
    target: &str,
    children: &[Arc<ConceptNode>],
    policy: MergePolicy,
) -> MergeOutcome {
    match rewrite(tree, target, children, policy) {
        Some(merged) => MergeOutcome::Merged(merged),
        None => MergeOutcome::TargetNotFound,
    }
}

fn rewrite(
    node: &Arc<ConceptNode>,
    target: &str,
    children: &[Arc<ConceptNode>],
    policy: MergePolicy,
) -> Option<Arc<ConceptNode>> {
    if node.name == target {
        return Some(Arc::new(ConceptNode {
            name: node.name.clone(),
            value: node.value,
            children: policy.combine(&node.children, children),
        }));
    }

    node.children.iter().enumerate().find_map(|(index, child)| {
        let replaced = rewrite(child, target, children, policy)?;
        let mut siblings = node.children.clone();
        siblings[index] = replaced;
        Some(Arc::new(ConceptNode {
            name: node.name.clone(),
            value: node.value,
            children: siblings,
        }))
    })
}
