mod coordinator;
mod handoff;

pub use coordinator::{BookContext, ModeSwitchCoordinator, RendererHost, SwitchPhase};
pub use handoff::HandOff;
