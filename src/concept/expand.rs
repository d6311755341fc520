use super::tree::ConceptNode;

#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("the model rejected the API key: {0}")]
    InvalidCredential(String),
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model response did not contain a concept tree: {0}")]
    MalformedResponse(String),
}

/// Source of child concepts for a node.
///
/// `parent_context` is empty when the whole diagram is being generated from a
/// single root word. Implementations block; callers run them off the UI thread.
pub trait Expander: Send + Sync {
    fn expand(
        &self,
        concept: &str,
        parent_context: &str,
        credential: &str,
    ) -> Result<ConceptNode, ExpandError>;
}
