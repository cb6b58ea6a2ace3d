//! Debounced persistence of reading positions.

mod scheduler;

pub use scheduler::{FlushOutcome, PersistenceScheduler};
