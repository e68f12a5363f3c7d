//! Lobby capacity and behavior options.

use serde::{Deserialize, Serialize};

/// Lowest accepted aspect ratio.
pub const MIN_ASPECT_RATIO: f64 = 0.25;
/// Highest accepted aspect ratio.
pub const MAX_ASPECT_RATIO: f64 = 4.0;
/// Value assigned when the client sends a non-finite aspect ratio.
pub const FALLBACK_ASPECT_RATIO: f64 = 1.0;

/// Options consumed by the session and object registries.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LobbyOptions {
    /// Maximum number of concurrently active (non-empty) sessions.
    pub max_sessions: usize,
    /// Maximum number of members in a single session.
    pub max_members_per_session: usize,
    /// Spread session-scoped orphans across all remaining members instead of
    /// handing them all to the first survivor.
    pub distribute_orphaned_objects: bool,
}

impl Default for LobbyOptions {
    fn default() -> Self {
        Self {
            max_sessions: 6,
            max_members_per_session: 4,
            distribute_orphaned_objects: true,
        }
    }
}

/// Clamp a client-supplied aspect ratio into the accepted range.
///
/// Non-finite input (NaN, ±inf) maps to [`FALLBACK_ASPECT_RATIO`].
#[must_use]
pub fn clamp_aspect_ratio(value: f64) -> f64 {
    if !value.is_finite() {
        return FALLBACK_ASPECT_RATIO;
    }
    value.clamp(MIN_ASPECT_RATIO, MAX_ASPECT_RATIO)
}
