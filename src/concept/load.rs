use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use super::tree::ConceptNode;

/// Reads a concept tree saved as JSON (`{"name": .., "children": [..]}`).
pub fn load_tree_file(path: &Path) -> Result<ConceptNode> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read concept tree from {}", path.display()))?;

    parse_tree(&raw).with_context(|| format!("invalid concept tree in {}", path.display()))
}

fn parse_tree(raw: &str) -> Result<ConceptNode> {
    let node: ConceptNode = serde_json::from_str(raw).context("invalid JSON")?;
    let node = node.sanitized();

    // The root name is the context sent along with first-level expansions.
    if node.name.is_empty() {
        return Err(anyhow!("concept tree root has no name"));
    }

    Ok(node)
}
