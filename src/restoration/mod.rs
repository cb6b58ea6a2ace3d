//! Finding a saved position again in a freshly laid-out chapter.

mod resolver;
mod state;

pub use resolver::{resolve_once, ResolveStep};
pub use state::RestoreState;
