/// WorldState: the complete snapshot of a running level.
///
/// ## Layers
///
/// Three grids, composed at query time:
///   - `background` — walkable ground. **Never mutated** after load.
///   - `overlay`    — walls/rocks/goal/bed/blockers (static) and boxes
///     (the only mutable tiles, moved by push/fall resolution).
///   - `holes`      — linked hole tags. Static.
///
/// Hole fill state is never stored: a hole is "filled" exactly when the
/// overlay at its paired cell holds a box. `hole_filled()` is the single
/// source of truth.
///
/// The `links` table is built once by the loader and immutable after.

use crate::domain::links::LinkTable;
use crate::domain::rules::MapView;
use crate::domain::tile::{BackTile, Cell, Direction, Grid, HoleTag, Overlay};

/// Static per-agent role flags. They alter goal traversability and the
/// win/lose tiles (goal for a middle agent, bed for the first, hole for
/// the last; bed ends the game for the last).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct AgentRole {
    pub is_first: bool,
    pub is_last: bool,
}

impl AgentRole {
    pub const FIRST: AgentRole = AgentRole { is_first: true, is_last: false };
    pub const MIDDLE: AgentRole = AgentRole { is_first: false, is_last: false };
    pub const LAST: AgentRole = AgentRole { is_first: false, is_last: true };
}

#[derive(Debug)]
pub struct WorldState {
    pub name: String,

    // ── Layers ──
    pub background: Grid<Option<BackTile>>,
    pub overlay: Grid<Option<Overlay>>,
    pub holes: Grid<Option<HoleTag>>,

    // ── Link tables (immutable after load) ──
    pub links: LinkTable,

    // ── Agent ──
    pub agent: Cell,
    pub facing: Direction,
    pub role: AgentRole,

    // ── Engine-owned cadence: persists across steps ──
    pub left_foot: bool,

    // ── Meta ──
    pub steps: u64,
    /// Load-time validation notes (cycle probes). Advisory only.
    pub warnings: Vec<String>,
}

impl WorldState {
    /// Rule-query view over the current layers.
    pub fn view(&self) -> MapView<'_> {
        MapView {
            background: &self.background,
            overlay: &self.overlay,
            holes: &self.holes,
            links: &self.links,
            first_agent: self.role.is_first,
        }
    }

    /// Is the hole at `c` currently blocked by a box on its partner?
    pub fn hole_filled(&self, c: Cell) -> bool {
        match self.links.hole_partner(c) {
            Some(partner) => self.overlay.at(partner).map_or(false, Overlay::is_box),
            None => false,
        }
    }
}
