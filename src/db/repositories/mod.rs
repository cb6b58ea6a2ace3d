pub mod positions;

pub use positions::PositionSummary;
