/// Traversability and pushability — pure queries over the tile layers.
///
/// These encode "what is legal" without performing the action. Both
/// queries thread through teleport walls (one redirection per wall entry)
/// and chain through linked holes and box runs.
///
/// ## Enter rules
/// ┌────────────────────────────────────────────┬──────┐
/// │ Condition (checked in order)                │ Enter│
/// ├────────────────────────────────────────────┼──────┤
/// │ no background tile (void / out of bounds)   │ DENY │
/// │ wall cell → substitute (pos, dir) via link  │  —   │
/// │ overlay Rock or Blocker                     │ DENY │
/// │ overlay Goal, agent is "first"              │ DENY │
/// │ overlay Box, no direction                   │ DENY │
/// │ overlay Box → pushable beyond?              │ defer│
/// │ unfilled linked hole, direction given       │ re-  │
/// │   → re-check landing (partner + dir)        │ enter│
/// │ otherwise                                   │ ALLOW│
/// └────────────────────────────────────────────┴──────┘
///
/// ## Push rules
/// Same bounds/wall handling; Rock, Goal and Blocker stop a box; another
/// box extends the chain; anything else is a free landing cell.
///
/// ## Guard
/// Wall and hole pairings are data-defined, so a malformed world can form
/// a cycle. Every query carries a step budget equal to the grid's cell
/// count; exhausting it resolves to "not traversable" / "not pushable"
/// instead of looping. `probe_*` variants report the trip so world
/// validation can warn at load time.

use super::links::LinkTable;
use super::tile::{BackTile, Cell, Direction, Grid, HoleTag, Overlay};

/// Immutable view of the world for rule queries.
pub struct MapView<'a> {
    pub background: &'a Grid<Option<BackTile>>,
    pub overlay: &'a Grid<Option<Overlay>>,
    pub holes: &'a Grid<Option<HoleTag>>,
    pub links: &'a LinkTable,
    /// The distinguished "first" agent may not stand on the goal tile.
    pub first_agent: bool,
}

/// Outcome of a guarded query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    /// The step budget ran out — a pairing cycle, not a normal denial.
    pub cycle_detected: bool,
}

impl Verdict {
    const DENY: Verdict = Verdict { allowed: false, cycle_detected: false };
    const ALLOW: Verdict = Verdict { allowed: true, cycle_detected: false };
    const TRIPPED: Verdict = Verdict { allowed: false, cycle_detected: true };
}

impl<'a> MapView<'a> {
    /// May an agent move into `pos` while traveling in `dir`?
    /// `dir = None` is the terminal hole-destination check only.
    pub fn can_enter(&self, pos: Cell, dir: Option<Direction>) -> bool {
        self.probe_enter(pos, dir).allowed
    }

    /// Can the box chain starting at `pos` (a cell holding a box) be
    /// pushed one cell in `dir`?
    pub fn can_push(&self, pos: Cell, dir: Direction) -> bool {
        self.probe_push(pos, dir).allowed
    }

    pub fn probe_enter(&self, pos: Cell, dir: Option<Direction>) -> Verdict {
        let mut budget = self.background.cell_count();
        self.enter_guarded(pos, dir, &mut budget)
    }

    pub fn probe_push(&self, pos: Cell, dir: Direction) -> Verdict {
        let mut budget = self.background.cell_count();
        self.push_guarded(pos + dir, Some(dir), &mut budget)
    }

    // ── Guarded recursion, written as loops ──

    fn enter_guarded(
        &self,
        mut pos: Cell,
        mut dir: Option<Direction>,
        budget: &mut u32,
    ) -> Verdict {
        loop {
            if *budget == 0 {
                return Verdict::TRIPPED;
            }
            *budget -= 1;

            if self.background.at(pos).is_none() {
                return Verdict::DENY;
            }

            // One redirection per wall entry; the substituted cell is
            // checked as-is, even if it is itself a wall.
            if self.overlay.at(pos).map_or(false, Overlay::is_wall) {
                if let Some((p, d)) = self.links.resolve_wall_exit(self.overlay, pos) {
                    pos = p;
                    dir = d;
                }
            }

            match self.overlay.at(pos) {
                Some(Overlay::Rock) | Some(Overlay::Blocker) => return Verdict::DENY,
                Some(Overlay::Goal) if self.first_agent => return Verdict::DENY,
                Some(Overlay::Box) => {
                    return match dir {
                        Some(d) => self.push_guarded(pos + d, Some(d), budget),
                        None => Verdict::DENY,
                    };
                }
                _ => {}
            }

            // Falling through an unfilled hole: the landing cell beyond
            // the partner must also accept the agent.
            if let (Some(d), Some(_)) = (dir, self.holes.at(pos)) {
                if let Some(partner) = self.links.hole_partner(pos) {
                    let filled = self.overlay.at(partner).map_or(false, Overlay::is_box);
                    if !filled {
                        pos = partner + d;
                        continue;
                    }
                }
            }

            return Verdict::ALLOW;
        }
    }

    fn push_guarded(
        &self,
        mut pos: Cell,
        mut dir: Option<Direction>,
        budget: &mut u32,
    ) -> Verdict {
        loop {
            if *budget == 0 {
                return Verdict::TRIPPED;
            }
            *budget -= 1;

            if self.background.at(pos).is_none() {
                return Verdict::DENY;
            }

            if self.overlay.at(pos).map_or(false, Overlay::is_wall) {
                if let Some((p, d)) = self.links.resolve_wall_exit(self.overlay, pos) {
                    pos = p;
                    dir = d;
                }
            }

            match self.overlay.at(pos) {
                Some(Overlay::Rock) | Some(Overlay::Goal) | Some(Overlay::Blocker) => {
                    return Verdict::DENY;
                }
                Some(Overlay::Box) => match dir {
                    Some(d) => {
                        pos = pos + d;
                        continue;
                    }
                    // A metadata-less wall exit left the chain with no
                    // direction to continue in.
                    None => return Verdict::DENY,
                },
                _ => return Verdict::ALLOW,
            }
        }
    }
}

/// Load-time world probe: report every linked hole or wall cell whose
/// traversal trips the cycle guard. Purely advisory; the guarded queries
/// already resolve such cells to "not traversable" at runtime.
pub fn validate(view: &MapView) -> Vec<String> {
    let mut warnings = Vec::new();

    for hole in view.links.hole_cells() {
        if Direction::ALL
            .iter()
            .any(|&d| view.probe_enter(hole, Some(d)).cycle_detected)
        {
            warnings.push(format!(
                "hole at ({}, {}): pairing forms a traversal cycle",
                hole.x, hole.y
            ));
        }
    }

    for pair in view.links.wall_pairs() {
        let tripped = [&pair.a, &pair.b].into_iter().any(|seg| {
            (0..seg.len).any(|off| {
                let cell = seg.cell_at(off);
                Direction::ALL
                    .iter()
                    .any(|&d| view.probe_enter(cell, Some(d)).cycle_detected)
            })
        });
        if tripped {
            warnings.push(format!(
                "{} wall pairing forms a traversal cycle",
                pair.color.name()
            ));
        }
    }

    warnings
}
