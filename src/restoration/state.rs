use serde::Serialize;

/// Restoration progress for one mount.
///
/// `Idle → Attempting(n) → Restored | Degraded`; `Skipped` when there was
/// nothing to restore and `Cancelled` when the mount went away first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RestoreState {
    #[default]
    Idle,
    Attempting(u32),
    Restored,
    Degraded,
    Skipped,
    Cancelled,
}

impl RestoreState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Restored | Self::Degraded | Self::Skipped | Self::Cancelled
        )
    }

    /// While a saved position is still being located, the renderer sits on
    /// its default anchor and sampling it would overwrite the saved record.
    pub fn blocks_sampling(self) -> bool {
        matches!(self, Self::Idle | Self::Attempting(_))
    }
}
