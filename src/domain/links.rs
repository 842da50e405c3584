/// Wall and hole linking: the one-time pass that turns raw tile metadata
/// into the lookup tables every traversal query reads.
///
/// ## Wall pairing
///
/// A *segment* is a maximal straight run of same-colored wall cells along
/// the growth axis carried by the tiles. Segments are discovered by a
/// raster scan (row-major, deterministic for a fixed world); the first
/// segment of a color becomes role A, the second role B. Anything else —
/// a color with one segment, or a third segment — is a world-authoring
/// defect and rejected at build time.
///
/// ## Hole pairing
///
/// Hole cells pair by tag: first occurrence is the pending anchor, the
/// second closes the link both ways. Odd counts and triples are rejected.
///
/// The tables are immutable after `build`; the geometry that defines
/// pairing never changes mid-game.

use std::collections::HashMap;

use thiserror::Error;

use super::tile::{Cell, Direction, Grid, HoleTag, Overlay, WallColor};

/// World-authoring defects caught while linking. These reject the world
/// at load time; downstream resolution assumes exactly one partner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("wall color {} has only one segment", .0.name())]
    UnpairedWall(WallColor),
    #[error("wall color {} has more than two segments", .0.name())]
    ExtraWallSegment(WallColor),
    #[error("hole tag '{}' has no partner", .0 .0)]
    UnpairedHole(HoleTag),
    #[error("hole tag '{}' appears more than twice", .0 .0)]
    ExtraHole(HoleTag),
}

/// Which half of a pairing a segment is. Assigned by scan discovery order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WallRole {
    A,
    B,
}

impl WallRole {
    fn other(self) -> WallRole {
        match self {
            WallRole::A => WallRole::B,
            WallRole::B => WallRole::A,
        }
    }
}

/// A maximal straight run of same-colored wall cells.
/// `anchor` is the backward-most cell along `growth`; offsets within the
/// segment are counted from it, so they are always non-negative.
#[derive(Clone, Copy, Debug)]
pub struct WallSegment {
    pub color: WallColor,
    pub anchor: Cell,
    pub growth: Direction,
    pub len: i32,
}

impl WallSegment {
    /// Cell at the given offset from the anchor. Not clamped to `len`:
    /// mismatched pair lengths resolve past the segment end on purpose.
    pub fn cell_at(&self, offset: i32) -> Cell {
        let (dx, dy) = self.growth.delta();
        Cell::new(self.anchor.x + dx * offset, self.anchor.y + dy * offset)
    }
}

/// The two segments sharing one color.
#[derive(Clone, Copy, Debug)]
pub struct WallPair {
    pub color: WallColor,
    pub a: WallSegment,
    pub b: WallSegment,
}

impl WallPair {
    fn segment(&self, role: WallRole) -> &WallSegment {
        match role {
            WallRole::A => &self.a,
            WallRole::B => &self.b,
        }
    }
}

/// Immutable link tables produced once at world initialization.
#[derive(Clone, Debug, Default)]
pub struct LinkTable {
    pairs: Vec<WallPair>,
    /// wall cell → (index into `pairs`, its segment's role)
    roles: HashMap<Cell, (usize, WallRole)>,
    /// hole cell → partner hole cell, both directions present
    holes: HashMap<Cell, Cell>,
}

impl LinkTable {
    /// Run both linking scans. Fails fast on any pairing defect.
    pub fn build(
        overlay: &Grid<Option<Overlay>>,
        holes: &Grid<Option<HoleTag>>,
    ) -> Result<LinkTable, LinkError> {
        let mut table = LinkTable::default();
        table.link_walls(overlay)?;
        table.link_holes(holes)?;
        Ok(table)
    }

    pub fn wall_pairs(&self) -> &[WallPair] {
        &self.pairs
    }

    /// Role of the segment owning this wall cell, if any.
    pub fn wall_role(&self, c: Cell) -> Option<WallRole> {
        self.roles.get(&c).map(|&(_, role)| role)
    }

    /// The paired hole cell, if this cell is a linked hole.
    pub fn hole_partner(&self, c: Cell) -> Option<Cell> {
        self.holes.get(&c).copied()
    }

    /// All linked hole cells (each link appears from both ends).
    pub fn hole_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.holes.keys().copied()
    }

    /// Resolve a teleport through the wall at `pos`.
    ///
    /// The offset of `pos` within its segment is projected onto the
    /// partner segment; the cell found there supplies the exit direction.
    /// Returns the exit cell (partner cell + exit direction) and the exit
    /// direction itself. If the partner is shorter and the projected cell
    /// carries no wall metadata, the exit direction is `None` and the
    /// arrival stays on the projected cell.
    pub fn resolve_wall_exit(
        &self,
        overlay: &Grid<Option<Overlay>>,
        pos: Cell,
    ) -> Option<(Cell, Option<Direction>)> {
        let &(pair_idx, role) = self.roles.get(&pos)?;
        let pair = &self.pairs[pair_idx];
        let sender = pair.segment(role);
        let receiver = pair.segment(role.other());

        let offset = sender.growth.project(sender.anchor, pos);
        let landing = receiver.cell_at(offset);

        match overlay.at(landing) {
            Some(Overlay::Wall { exit, .. }) => Some((landing + exit, Some(exit))),
            // Length-mismatch overrun: no metadata at the projected cell.
            _ => Some((landing, None)),
        }
    }

    // ── Wall scan ──

    fn link_walls(&mut self, overlay: &Grid<Option<Overlay>>) -> Result<(), LinkError> {
        // color → index into pairs under construction
        let mut by_color: HashMap<WallColor, usize> = HashMap::new();
        let mut b_filled: Vec<bool> = Vec::new();

        for pos in overlay.positions() {
            let (color, growth) = match overlay.at(pos) {
                Some(Overlay::Wall { color, growth, .. }) => (color, growth),
                _ => continue,
            };
            if self.roles.contains_key(&pos) {
                continue; // already swept into an earlier segment
            }

            let (pair_idx, role) = match by_color.get(&color).copied() {
                None => {
                    by_color.insert(color, self.pairs.len());
                    b_filled.push(false);
                    (self.pairs.len(), WallRole::A)
                }
                Some(idx) if !b_filled[idx] => {
                    b_filled[idx] = true;
                    (idx, WallRole::B)
                }
                Some(_) => return Err(LinkError::ExtraWallSegment(color)),
            };

            let segment = self.sweep_segment(overlay, pos, color, growth, pair_idx, role);

            match role {
                WallRole::A => self.pairs.push(WallPair {
                    color,
                    a: segment,
                    b: segment, // placeholder until B is discovered
                }),
                WallRole::B => self.pairs[pair_idx].b = segment,
            }
        }

        for (color, &idx) in &by_color {
            if !b_filled[idx] {
                return Err(LinkError::UnpairedWall(*color));
            }
        }
        Ok(())
    }

    /// Greedily extend from `seed` along ±growth while cells remain walls
    /// of the same color, recording each cell's role as we go.
    fn sweep_segment(
        &mut self,
        overlay: &Grid<Option<Overlay>>,
        seed: Cell,
        color: WallColor,
        growth: Direction,
        pair_idx: usize,
        role: WallRole,
    ) -> WallSegment {
        let same_color = |c: Cell| {
            matches!(overlay.at(c), Some(Overlay::Wall { color: k, .. }) if k == color)
        };

        self.roles.insert(seed, (pair_idx, role));

        let mut end = seed;
        while same_color(end + growth) {
            end = end + growth;
            self.roles.insert(end, (pair_idx, role));
        }

        let mut anchor = seed;
        while same_color(anchor + -growth) {
            anchor = anchor + -growth;
            self.roles.insert(anchor, (pair_idx, role));
        }

        WallSegment {
            color,
            anchor,
            growth,
            len: growth.project(anchor, end) + 1,
        }
    }

    // ── Hole scan ──

    fn link_holes(&mut self, holes: &Grid<Option<HoleTag>>) -> Result<(), LinkError> {
        let mut pending: HashMap<HoleTag, Cell> = HashMap::new();

        for pos in holes.positions() {
            let tag = match holes.at(pos) {
                Some(tag) => tag,
                None => continue,
            };
            match pending.remove(&tag) {
                None => {
                    if self.holes.keys().any(|c| holes.at(*c) == Some(tag)) {
                        return Err(LinkError::ExtraHole(tag));
                    }
                    pending.insert(tag, pos);
                }
                Some(anchor) => {
                    self.holes.insert(pos, anchor);
                    self.holes.insert(anchor, pos);
                }
            }
        }

        if let Some((&tag, _)) = pending.iter().next() {
            return Err(LinkError::UnpairedHole(tag));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::{Down, Left, Right, Up};

    fn wall(color: WallColor, growth: Direction, exit: Direction) -> Overlay {
        Overlay::Wall { color, growth, exit }
    }

    fn overlay_grid(w: i32, h: i32, cells: &[(i32, i32, Overlay)]) -> Grid<Option<Overlay>> {
        let mut g = Grid::new(w, h, None);
        for &(x, y, tile) in cells {
            g.set(Cell::new(x, y), Some(tile));
        }
        g
    }

    fn hole_grid(w: i32, h: i32, cells: &[(i32, i32, char)]) -> Grid<Option<HoleTag>> {
        let mut g = Grid::new(w, h, None);
        for &(x, y, tag) in cells {
            g.set(Cell::new(x, y), Some(HoleTag(tag)));
        }
        g
    }

    /// Two vertical blue segments of length 3, exits facing each other.
    fn blue_pair() -> Grid<Option<Overlay>> {
        let mut cells = vec![];
        for y in 0..3 {
            cells.push((5, y, wall(WallColor::Blue, Down, Right)));
            cells.push((5, y + 5, wall(WallColor::Blue, Down, Left)));
        }
        overlay_grid(10, 10, &cells)
    }

    #[test]
    fn discovers_two_segments_with_scan_order_roles() {
        let overlay = blue_pair();
        let table = LinkTable::build(&overlay, &hole_grid(10, 10, &[])).unwrap();

        assert_eq!(table.wall_pairs().len(), 1);
        let pair = &table.wall_pairs()[0];
        assert_eq!(pair.a.anchor, Cell::new(5, 0));
        assert_eq!(pair.b.anchor, Cell::new(5, 5));
        assert_eq!(pair.a.len, 3);
        assert_eq!(pair.b.len, 3);
        assert_eq!(table.wall_role(Cell::new(5, 1)), Some(WallRole::A));
        assert_eq!(table.wall_role(Cell::new(5, 6)), Some(WallRole::B));
    }

    #[test]
    fn sweep_extends_backward_to_the_anchor() {
        // Seed hit first by raster scan is the TOP cell; growth Up means
        // the anchor must end up at the bottom-most cell.
        let cells: Vec<_> = (0..3)
            .flat_map(|y| {
                vec![
                    (2, y, wall(WallColor::Red, Up, Right)),
                    (7, y, wall(WallColor::Red, Up, Right)),
                ]
            })
            .collect();
        let overlay = overlay_grid(10, 5, &cells);
        let table = LinkTable::build(&overlay, &hole_grid(10, 5, &[])).unwrap();
        let pair = &table.wall_pairs()[0];
        assert_eq!(pair.a.anchor, Cell::new(2, 2));
        assert_eq!(pair.a.len, 3);
    }

    #[test]
    fn middle_cell_teleports_to_partner_middle() {
        let overlay = blue_pair();
        let table = LinkTable::build(&overlay, &hole_grid(10, 10, &[])).unwrap();

        // Entering A's middle cell: lands on B's middle, ejected Left.
        let (exit, dir) = table.resolve_wall_exit(&overlay, Cell::new(5, 1)).unwrap();
        assert_eq!(dir, Some(Left));
        assert_eq!(exit, Cell::new(4, 6));

        // And symmetrically back: B's middle ejects Right of A's middle.
        let (exit, dir) = table.resolve_wall_exit(&overlay, Cell::new(5, 6)).unwrap();
        assert_eq!(dir, Some(Right));
        assert_eq!(exit, Cell::new(6, 1));
    }

    #[test]
    fn pairing_symmetry_roundtrip() {
        let overlay = blue_pair();
        let table = LinkTable::build(&overlay, &hole_grid(10, 10, &[])).unwrap();
        for y in 0..3 {
            let from = Cell::new(5, y);
            let (exit, dir) = table.resolve_wall_exit(&overlay, from).unwrap();
            // step back onto the partner cell, resolve again
            let partner = exit + -dir.unwrap();
            let (back, _) = table.resolve_wall_exit(&overlay, partner).unwrap();
            assert_eq!(back + -Right, from, "offset preserved for row {y}");
        }
    }

    #[test]
    fn mismatched_lengths_resolve_past_segment_end() {
        // A has 3 cells, B only 1: offset 2 projects past B's extent.
        let mut cells = vec![(0, 5, wall(WallColor::Orange, Down, Right))];
        for y in 0..3 {
            cells.push((0, y, wall(WallColor::Orange, Down, Right)));
        }
        // overlapping rows would merge the segments, keep them apart
        let overlay = overlay_grid(4, 10, &cells);
        let table = LinkTable::build(&overlay, &hole_grid(4, 10, &[])).unwrap();

        let (exit, dir) = table.resolve_wall_exit(&overlay, Cell::new(0, 2)).unwrap();
        // projected cell (0,7) carries no wall metadata: unguarded landing
        assert_eq!(dir, None);
        assert_eq!(exit, Cell::new(0, 7));
    }

    #[test]
    fn single_segment_color_is_rejected() {
        let overlay = overlay_grid(5, 5, &[(1, 1, wall(WallColor::Purple, Right, Up))]);
        let err = LinkTable::build(&overlay, &hole_grid(5, 5, &[])).unwrap_err();
        assert_eq!(err, LinkError::UnpairedWall(WallColor::Purple));
    }

    #[test]
    fn third_segment_of_a_color_is_rejected() {
        let overlay = overlay_grid(
            7,
            3,
            &[
                (0, 1, wall(WallColor::Blue, Right, Up)),
                (3, 1, wall(WallColor::Blue, Right, Up)),
                (6, 1, wall(WallColor::Blue, Right, Up)),
            ],
        );
        let err = LinkTable::build(&overlay, &hole_grid(7, 3, &[])).unwrap_err();
        assert_eq!(err, LinkError::ExtraWallSegment(WallColor::Blue));
    }

    #[test]
    fn hole_links_are_symmetric() {
        let holes = hole_grid(10, 10, &[(2, 2, 'a'), (8, 8, 'a'), (1, 5, 'b'), (6, 0, 'b')]);
        let table = LinkTable::build(&overlay_grid(10, 10, &[]), &holes).unwrap();
        assert_eq!(table.hole_partner(Cell::new(2, 2)), Some(Cell::new(8, 8)));
        assert_eq!(table.hole_partner(Cell::new(8, 8)), Some(Cell::new(2, 2)));
        assert_eq!(table.hole_partner(Cell::new(6, 0)), Some(Cell::new(1, 5)));
        assert_eq!(table.hole_partner(Cell::new(0, 0)), None);
    }

    #[test]
    fn unpaired_hole_is_rejected() {
        let holes = hole_grid(4, 4, &[(0, 0, 'a'), (3, 3, 'a'), (2, 2, 'z')]);
        let err = LinkTable::build(&overlay_grid(4, 4, &[]), &holes).unwrap_err();
        assert_eq!(err, LinkError::UnpairedHole(HoleTag('z')));
    }

    #[test]
    fn triple_hole_tag_is_rejected() {
        let holes = hole_grid(4, 4, &[(0, 0, 'a'), (1, 1, 'a'), (2, 2, 'a'), (3, 3, 'a')]);
        let err = LinkTable::build(&overlay_grid(4, 4, &[]), &holes).unwrap_err();
        assert_eq!(err, LinkError::ExtraHole(HoleTag('a')));
    }
}
