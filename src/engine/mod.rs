pub mod config;
mod controller;
mod state;

pub use config::EngineConfig;
pub use controller::{MountParams, ReaderEngine};
pub use state::EngineState;
