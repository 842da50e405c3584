/// Events emitted while resolving one movement step.
/// The presentation layer consumes these for sprite/audio cues;
/// the engine itself performs no I/O.

use crate::domain::tile::Cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveEvent {
    /// Ordinary footstep. Cadence alternates across accepted steps.
    WalkStep { left_foot: bool },
    /// A box (or box chain link) slid one cell.
    Slide,
    /// The agent was redirected through a wall pairing.
    Teleport,
    /// The agent dropped through a linked hole.
    Fall,
}

/// Result of one `step` call: where the agent ended up, everything that
/// happened on the way, and the win/lose verdict for the new cell.
#[derive(Clone, Debug)]
pub struct MovementOutcome {
    pub new_pos: Cell,
    pub events: Vec<MoveEvent>,
    pub won: bool,
    pub lost: bool,
}
