/// The movement engine: one accepted input becomes one atomic step.
///
/// Resolution order inside a step (mirrors the traversability contract —
/// the caller has already verified `can_enter(agent + dir, dir)`):
///   1. Advance one cell.
///   2. Wall cell → substitute position/direction through the pairing
///      (Teleport event, footstep suppressed).
///   3. Box → execute the chain push (Slide event per box moved).
///   4. Linked, passable hole → drop to the partner and repeat the
///      landing resolution from there (Fall event, footstep suppressed).
///   5. No teleport/fall → WalkStep with the alternating cadence.
///
/// The whole step completes eagerly; there is no partial state between
/// inputs. Fall repetition carries the same cell-count budget as the
/// rule queries, so a malformed pairing ends the step instead of
/// looping.

use crate::domain::tile::{Cell, Direction, Overlay};
use super::event::{MoveEvent, MovementOutcome};
use super::world::WorldState;

/// Advance the world by one accepted step in `dir`.
///
/// If the destination is not traversable the world is left untouched and
/// the outcome carries no events. Input layers normally pre-check with
/// `world.view().can_enter(..)`, so this is just a backstop.
pub fn step(world: &mut WorldState, dir: Direction) -> MovementOutcome {
    if !world.view().can_enter(world.agent + dir, Some(dir)) {
        return MovementOutcome {
            new_pos: world.agent,
            events: vec![],
            won: false,
            lost: false,
        };
    }

    let mut events = Vec::new();
    let new_pos = resolve_landing(world, dir, &mut events);

    world.agent = new_pos;
    world.facing = dir;
    world.steps += 1;

    MovementOutcome {
        new_pos,
        events,
        won: is_won(world),
        lost: is_lost(world),
    }
}

// ══════════════════════════════════════════════════════════════
// Landing resolution
// ══════════════════════════════════════════════════════════════

fn resolve_landing(world: &mut WorldState, dir: Direction, events: &mut Vec<MoveEvent>) -> Cell {
    let mut pos = world.agent;
    let mut dir = Some(dir);
    let mut footstep = true;
    let mut budget = world.background.cell_count();

    loop {
        let d = match dir {
            Some(d) => d,
            None => break, // a metadata-less wall exit: the agent stays put
        };
        pos = pos + d;

        if world.overlay.at(pos).map_or(false, Overlay::is_wall) {
            if let Some((p, nd)) = world.links.resolve_wall_exit(&world.overlay, pos) {
                pos = p;
                dir = nd;
                events.push(MoveEvent::Teleport);
                footstep = false;
            }
        }

        if world.overlay.at(pos).map_or(false, Overlay::is_box) {
            if let Some(d) = dir {
                push_chain(world, pos, d, events);
            }
        }

        // Drop through a linked hole when both the partner cell and the
        // landing beyond it accept the agent; then resolve again from
        // the partner (chained holes keep falling).
        if let (Some(d), Some(partner)) =
            (dir, world.holes.at(pos).and_then(|_| world.links.hole_partner(pos)))
        {
            let view = world.view();
            if view.can_enter(partner, None) && view.can_enter(partner + d, Some(d)) {
                pos = partner;
                events.push(MoveEvent::Fall);
                footstep = false;
                budget -= 1;
                if budget == 0 {
                    break;
                }
                continue;
            }
        }

        break;
    }

    if footstep {
        events.push(MoveEvent::WalkStep { left_foot: world.left_foot });
        world.left_foot = !world.left_foot;
    }

    pos
}

// ══════════════════════════════════════════════════════════════
// Push execution
// ══════════════════════════════════════════════════════════════

/// Execute a legal chain push starting at the box on `first`.
///
/// The chain is walked front-to-back (resolving at most one wall
/// redirection per link), then applied tail-first so the far end moves
/// before the cell behind it lands. Hole fill/unfill is the same overlay
/// mutation as the box move itself: a box arriving on a linked hole also
/// covers the partner, and a box leaving a linked hole uncovers it.
fn push_chain(world: &mut WorldState, first: Cell, dir: Direction, events: &mut Vec<MoveEvent>) {
    let mut moves: Vec<(Cell, Cell)> = Vec::new();
    let mut pos = first;
    let mut dir = Some(dir);
    let mut budget = world.background.cell_count();

    loop {
        let d = match dir {
            Some(d) => d,
            None => break,
        };
        let mut next = pos + d;

        if world.overlay.at(next).map_or(false, Overlay::is_wall) {
            if let Some((p, nd)) = world.links.resolve_wall_exit(&world.overlay, next) {
                next = p;
                dir = nd;
            }
        }

        moves.push((pos, next));
        events.push(MoveEvent::Slide);

        budget -= 1;
        if budget == 0 {
            break;
        }
        if world.overlay.at(next).map_or(false, Overlay::is_box) {
            pos = next;
        } else {
            break;
        }
    }

    for &(from, to) in moves.iter().rev() {
        if world.holes.at(to).is_some() {
            if let Some(partner) = world.links.hole_partner(to) {
                world.overlay.set(partner, Some(Overlay::Box));
            }
        }
        if world.holes.at(from).is_some() {
            if let Some(partner) = world.links.hole_partner(from) {
                world.overlay.set(partner, None);
            }
        }
        world.overlay.set(to, Some(Overlay::Box));
        world.overlay.set(from, None);
    }
}

// ══════════════════════════════════════════════════════════════
// Win / lose predicates
// ══════════════════════════════════════════════════════════════

/// Does the tile under the agent satisfy its role's win condition?
/// Goal for a middle agent, bed for the first, hole for the last.
pub fn is_won(world: &WorldState) -> bool {
    let c = world.agent;
    let edge = world.role.is_first || world.role.is_last;
    match world.overlay.at(c) {
        Some(Overlay::Goal) if !edge => return true,
        Some(Overlay::Bed) if world.role.is_first => return true,
        _ => {}
    }
    world.role.is_last && world.holes.at(c).is_some()
}

/// Terminal quit condition: the last agent reaching a bed ends the game.
pub fn is_lost(world: &WorldState) -> bool {
    world.role.is_last && matches!(world.overlay.at(world.agent), Some(Overlay::Bed))
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level;
    use Direction::{Down, Right};

    fn world(text: &str) -> WorldState {
        level::world_from_text(text).expect("test level must load")
    }

    fn at(x: i32, y: i32) -> Cell {
        Cell::new(x, y)
    }

    fn kinds(events: &[MoveEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                MoveEvent::WalkStep { .. } => "walk",
                MoveEvent::Slide => "slide",
                MoveEvent::Teleport => "teleport",
                MoveEvent::Fall => "fall",
            })
            .collect()
    }

    // ── Plain walking ──

    #[test]
    fn footsteps_alternate_across_steps() {
        let mut w = world(
            "# walkway\n\
             bg:\n\
             ....\n\
             ov:\n\
             P...\n",
        );
        let out1 = step(&mut w, Right);
        assert_eq!(out1.new_pos, at(1, 0));
        assert_eq!(out1.events, vec![MoveEvent::WalkStep { left_foot: false }]);
        let out2 = step(&mut w, Right);
        assert_eq!(out2.events, vec![MoveEvent::WalkStep { left_foot: true }]);
        assert_eq!(w.steps, 2);
    }

    #[test]
    fn denied_step_changes_nothing() {
        let mut w = world(
            "# bumped\n\
             bg:\n\
             ..\n\
             ov:\n\
             Pr\n",
        );
        let out = step(&mut w, Right);
        assert_eq!(out.new_pos, at(0, 0));
        assert!(out.events.is_empty());
        assert_eq!(w.agent, at(0, 0));
        assert_eq!(w.steps, 0);
    }

    // ── Pushing ──

    #[test]
    fn corridor_chain_push_moves_both_boxes() {
        // boxes at (1,0) and (2,0), clear (3,0): both shift one cell,
        // agent ends on (1,0)
        let mut w = world(
            "# corridor\n\
             bg:\n\
             ....\n\
             ov:\n\
             Poo.\n",
        );
        let out = step(&mut w, Right);
        assert_eq!(out.new_pos, at(1, 0));
        assert_eq!(w.overlay.at(at(1, 0)), None);
        assert_eq!(w.overlay.at(at(2, 0)), Some(Overlay::Box));
        assert_eq!(w.overlay.at(at(3, 0)), Some(Overlay::Box));
        // two chain links slid, then the footstep
        assert_eq!(kinds(&out.events), vec!["slide", "slide", "walk"]);
    }

    #[test]
    fn blocked_chain_is_rejected_whole() {
        let mut w = world(
            "# jammed\n\
             bg:\n\
             ....\n\
             ov:\n\
             Poor\n",
        );
        let out = step(&mut w, Right);
        assert!(out.events.is_empty());
        assert_eq!(w.agent, at(0, 0));
        assert_eq!(w.overlay.at(at(1, 0)), Some(Overlay::Box));
        assert_eq!(w.overlay.at(at(2, 0)), Some(Overlay::Box));
    }

    // ── Walls ──

    /// Two vertical blue segments per the classic layout: A in column 5
    /// rows 0-2 (exit right at every cell), B in column 5 rows 5-7
    /// (exit left). Agent below A's middle cell.
    fn wall_level() -> WorldState {
        world(
            "# mirror\n\
             wall A blue down right\n\
             wall B blue down left\n\
             bg:\n\
             ........\n\
             ........\n\
             ........\n\
             ........\n\
             ........\n\
             ........\n\
             ........\n\
             ........\n\
             ov:\n\
             .....A..\n\
             P....A..\n\
             .....A..\n\
             ........\n\
             ........\n\
             .....B..\n\
             .....B..\n\
             .....B..\n",
        )
    }

    #[test]
    fn entering_a_wall_teleports_to_the_partner_exit() {
        let mut w = wall_level();
        w.agent = at(5, 0);
        // step Down into A's middle cell (5,1): offset 1 → B's (5,6),
        // ejected Left → (4,6)
        let out = step(&mut w, Down);
        assert_eq!(out.new_pos, at(4, 6));
        assert_eq!(kinds(&out.events), vec!["teleport"]);
    }

    #[test]
    fn box_pushed_into_a_wall_comes_out_the_partner() {
        let mut w = wall_level();
        w.overlay.set(at(4, 1), Some(Overlay::Box));
        w.agent = at(3, 1);
        // push Right: box enters A (5,1), emerges at (4,6)
        let out = step(&mut w, Right);
        assert_eq!(out.new_pos, at(4, 1));
        assert_eq!(w.overlay.at(at(4, 6)), Some(Overlay::Box));
        assert_eq!(w.overlay.at(at(4, 1)), None);
        assert_eq!(kinds(&out.events), vec!["slide", "walk"]);
    }

    // ── Holes ──

    #[test]
    fn hole_with_blocked_landing_cannot_be_entered() {
        let mut w = world(
            "# pitfall\n\
             bg:\n\
             ......\n\
             ov:\n\
             P.....\n\
             holes:\n\
             .1...1\n",
        );
        // hole (1,0) partner (5,0): the landing beyond the partner is
        // off the map, so the hole itself is not traversable
        let out = step(&mut w, Right);
        assert!(out.events.is_empty());
        assert_eq!(w.agent, at(0, 0));
    }

    #[test]
    fn falling_through_a_hole_emits_fall() {
        let mut w = world(
            "# drop\n\
             bg:\n\
             ........\n\
             ov:\n\
             P.......\n\
             holes:\n\
             .1...1..\n",
        );
        // hole (1,0) partner (5,0): landing (6,0) clear → agent falls,
        // resuming one cell past the partner; no footstep after a fall
        let out = step(&mut w, Right);
        assert_eq!(out.new_pos, at(6, 0));
        assert_eq!(kinds(&out.events), vec!["fall"]);
    }

    #[test]
    fn pushing_the_cover_off_reopens_the_hole_beneath() {
        let mut w = world(
            "# paved\n\
             bg:\n\
             ........\n\
             ov:\n\
             P....o..\n\
             holes:\n\
             .1...1..\n",
        );
        // partner (5,0) holds a box, so the loader pre-covered (1,0).
        assert_eq!(w.overlay.at(at(1, 0)), Some(Overlay::Box));
        // Pushing the cover off (1,0) removes the paired box at (5,0),
        // reopening the hole — which the agent then falls through.
        let out = step(&mut w, Right);
        assert_eq!(w.overlay.at(at(2, 0)), Some(Overlay::Box));
        assert_eq!(w.overlay.at(at(5, 0)), None);
        assert_eq!(out.new_pos, at(6, 0));
        assert_eq!(kinds(&out.events), vec!["slide", "fall"]);
    }

    #[test]
    fn box_pushed_onto_a_hole_fills_the_partner() {
        let mut w = world(
            "# plug\n\
             bg:\n\
             ........\n\
             ov:\n\
             Po......\n\
             holes:\n\
             ..1...1.\n",
        );
        let out = step(&mut w, Right);
        assert_eq!(out.new_pos, at(1, 0));
        // box rests on the hole cell, partner is covered too
        assert_eq!(w.overlay.at(at(2, 0)), Some(Overlay::Box));
        assert_eq!(w.overlay.at(at(6, 0)), Some(Overlay::Box));
        assert!(w.hole_filled(at(2, 0)));
        assert!(w.hole_filled(at(6, 0)));
    }

    #[test]
    fn box_pushed_off_a_hole_unfills_the_partner() {
        // rock at (7,0) keeps the agent from falling into the hole it
        // reopens, so the unfill itself stays observable
        let mut w = world(
            "# unplug\n\
             bg:\n\
             ........\n\
             ov:\n\
             Po.....r\n\
             holes:\n\
             ..1...1.\n",
        );
        step(&mut w, Right); // fill: box on (2,0), cover on (6,0)
        let out = step(&mut w, Right); // push the box off the hole
        assert_eq!(out.new_pos, at(2, 0));
        assert_eq!(w.overlay.at(at(3, 0)), Some(Overlay::Box));
        assert_eq!(w.overlay.at(at(6, 0)), None);
        assert!(!w.hole_filled(at(2, 0)));
        assert_eq!(kinds(&out.events), vec!["slide", "walk"]);
    }

    // ── Win / lose ──

    #[test]
    fn middle_agent_wins_on_goal_first_wins_on_bed() {
        let mut w = world(
            "# beds\n\
             bg:\n\
             ...\n\
             ov:\n\
             Pgd\n",
        );
        let out = step(&mut w, Right);
        assert!(out.won);

        let mut w = world(
            "# beds\n\
             role first\n\
             bg:\n\
             ...\n\
             ov:\n\
             P.d\n",
        );
        step(&mut w, Right);
        let out = step(&mut w, Right);
        assert!(out.won);
    }

    #[test]
    fn goal_is_not_enterable_for_the_first_agent() {
        let mut w = world(
            "# blocked goal\n\
             role first\n\
             bg:\n\
             ..\n\
             ov:\n\
             Pg\n",
        );
        let out = step(&mut w, Right);
        assert!(out.events.is_empty());
        assert_eq!(w.agent, at(0, 0));
    }

    #[test]
    fn last_agent_wins_on_hole_and_ends_on_bed() {
        // the partner cell is blocked by a rock: the fall is denied at
        // the partner check, so the agent rests on the hole — its win
        // tile (the landing beyond the partner must still be clear for
        // the hole to be enterable at all)
        let mut w = world(
            "# rest\n\
             role last\n\
             bg:\n\
             ......\n\
             ov:\n\
             P...r.\n\
             holes:\n\
             .1..1.\n",
        );
        let out = step(&mut w, Right);
        assert_eq!(out.new_pos, at(1, 0));
        assert_eq!(kinds(&out.events), vec!["walk"]);
        assert!(out.won);

        let mut w = world(
            "# the end\n\
             role last\n\
             bg:\n\
             ..\n\
             ov:\n\
             Pd\n",
        );
        let out = step(&mut w, Right);
        assert!(out.lost);
    }

    #[test]
    fn cyclic_hole_world_still_terminates() {
        // 'a' links (1,0)↔(3,0), 'b' links (0,0)↔(4,0): entering (1,0)
        // heading right keeps landing back on a hole, forever. The step
        // is denied by the guarded check instead of hanging, and the
        // loader leaves a validation warning behind.
        let mut w = world(
            "# loop\n\
             bg:\n\
             ......\n\
             ov:\n\
             P.....\n\
             holes:\n\
             ba.ab.\n",
        );
        assert!(!w.warnings.is_empty());
        let out = step(&mut w, Right);
        assert!(out.events.is_empty());
        assert_eq!(w.agent, at(0, 0));
    }
}
