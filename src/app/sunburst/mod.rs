mod interaction;
mod layout;
mod transition;
mod view;

pub use interaction::ClickPolicy;
pub(super) use interaction::{PanGesture, ViewTransform};
pub(super) use layout::{ArcExtent, Partition};
pub(super) use transition::FocusTransition;
