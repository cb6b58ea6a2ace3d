use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::position::ReadingPosition;

/// Position carried from an outgoing mount to the next one.
///
/// Created by the engine being torn down and consumed by the engine being
/// mounted, so the switch never depends on a store round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandOff {
    /// Mount that produced this hand-off.
    pub mount_id: Uuid,
    pub position: Option<ReadingPosition>,
}

impl HandOff {
    pub fn new(mount_id: Uuid, position: Option<ReadingPosition>) -> Self {
        Self { mount_id, position }
    }

    pub fn position(&self) -> Option<&ReadingPosition> {
        self.position.as_ref()
    }

    pub fn into_position(self) -> Option<ReadingPosition> {
        self.position
    }
}
