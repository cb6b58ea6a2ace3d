pub mod position;

pub use position::{PersistedPosition, RECORD_VERSION};
