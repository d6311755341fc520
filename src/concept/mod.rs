mod expand;
mod gemini;
mod load;
mod merge;
mod tree;

pub use expand::{ExpandError, Expander};
pub use gemini::GeminiExpander;
pub use load::load_tree_file;
pub use merge::{MergeOutcome, MergePolicy, merge_children};
pub use tree::ConceptNode;
