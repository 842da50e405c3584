/// Cells, directions, and the three tile layers.
///
/// All tile metadata is typed and produced once at load time — the engine
/// never inspects names or strings. Layer semantics:
///   - background: walkable ground, static. Absent ⇒ untraversable void.
///   - overlay:    walls/boxes/rocks/goal/bed/blocker. Boxes are the only
///     mutable overlay tiles.
///   - holes:      linked hole tags, static.

use std::ops::{Add, Neg};

/// Grid position. Signed so offset arithmetic (wall projection) stays exact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Cell { x, y }
    }
}

impl Add<Direction> for Cell {
    type Output = Cell;
    fn add(self, dir: Direction) -> Cell {
        let (dx, dy) = dir.delta();
        Cell::new(self.x + dx, self.y + dy)
    }
}

/// One of the four unit moves. No diagonals.
/// `Up` is toward row 0 (screen convention, same as the renderer).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Signed projection of `(to - from)` onto this direction.
    /// Used for wall segment offsets.
    pub fn project(self, from: Cell, to: Cell) -> i32 {
        let (dx, dy) = self.delta();
        (to.x - from.x) * dx + (to.y - from.y) * dy
    }
}

impl Neg for Direction {
    type Output = Direction;
    fn neg(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Pairing color of a teleport wall. Every wall cell carries exactly one;
/// a color names exactly two segments in a well-formed world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WallColor {
    Blue,
    Purple,
    Red,
    Orange,
}

impl WallColor {
    pub fn name(self) -> &'static str {
        match self {
            WallColor::Blue => "blue",
            WallColor::Purple => "purple",
            WallColor::Red => "red",
            WallColor::Orange => "orange",
        }
    }
}

/// Background layer tile. Only one kind today; keeping the enum so the
/// loader and renderer stay explicit about "ground vs void".
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BackTile {
    Floor,
}

/// Overlay layer tile. Wall cells carry their full teleport metadata:
/// `growth` is the axis the segment extends along (for the linking scan),
/// `exit` is the direction an arrival at *this* cell is ejected.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Overlay {
    Wall {
        color: WallColor,
        growth: Direction,
        exit: Direction,
    },
    Box,
    Rock,
    Goal,
    Bed,
    Blocker,
}

impl Overlay {
    pub fn is_wall(self) -> bool {
        matches!(self, Overlay::Wall { .. })
    }

    pub fn is_box(self) -> bool {
        matches!(self, Overlay::Box)
    }
}

/// Hole pairing tag. Two hole cells sharing a tag form one link.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HoleTag(pub char);

// ── Grid arena ──

/// Dense 2D array indexed by `Cell`. Out-of-range reads return `None`
/// rather than panicking, so bounds checks fold into tile queries.
#[derive(Clone, Debug)]
pub struct Grid<T> {
    width: i32,
    height: i32,
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn new(width: i32, height: i32, fill: T) -> Self {
        let n = (width.max(0) as usize) * (height.max(0) as usize);
        Grid { width, height, cells: vec![fill; n] }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, c: Cell) -> bool {
        c.x >= 0 && c.x < self.width && c.y >= 0 && c.y < self.height
    }

    #[inline]
    fn index(&self, c: Cell) -> Option<usize> {
        if self.contains(c) {
            Some((c.y * self.width + c.x) as usize)
        } else {
            None
        }
    }

    pub fn get(&self, c: Cell) -> Option<T> {
        self.index(c).map(|i| self.cells[i])
    }

    /// Write a cell. Writes outside the bounds are dropped.
    pub fn set(&mut self, c: Cell, value: T) {
        if let Some(i) = self.index(c) {
            self.cells[i] = value;
        }
    }

    /// All cells in raster order (row-major, top-left first).
    /// This is the deterministic scan order the link builders rely on.
    pub fn positions(&self) -> impl Iterator<Item = Cell> + '_ {
        let (w, h) = (self.width, self.height);
        (0..h).flat_map(move |y| (0..w).map(move |x| Cell::new(x, y)))
    }

    /// Total cell count; used as the recursion budget for guarded queries.
    pub fn cell_count(&self) -> u32 {
        (self.width.max(1) as u32) * (self.height.max(1) as u32)
    }
}

impl<T: Copy> Grid<Option<T>> {
    /// Flattened read: out of bounds and empty both come back as `None`.
    #[inline]
    pub fn at(&self, c: Cell) -> Option<T> {
        self.get(c).flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_projection() {
        let a = Cell::new(5, 0);
        let b = Cell::new(5, 2);
        assert_eq!(Direction::Down.project(a, b), 2);
        assert_eq!(Direction::Up.project(a, b), -2);
        assert_eq!(Direction::Right.project(a, b), 0);
    }

    #[test]
    fn direction_negation() {
        for d in Direction::ALL {
            assert_eq!(-(-d), d);
        }
    }

    #[test]
    fn grid_out_of_bounds_reads_none() {
        let g: Grid<Option<BackTile>> = Grid::new(3, 2, None);
        assert_eq!(g.at(Cell::new(-1, 0)), None);
        assert_eq!(g.at(Cell::new(3, 0)), None);
        assert_eq!(g.at(Cell::new(0, 2)), None);
    }

    #[test]
    fn grid_set_get_roundtrip() {
        let mut g: Grid<Option<Overlay>> = Grid::new(4, 4, None);
        g.set(Cell::new(2, 3), Some(Overlay::Box));
        assert_eq!(g.at(Cell::new(2, 3)), Some(Overlay::Box));
        // out-of-bounds write is dropped, not a panic
        g.set(Cell::new(9, 9), Some(Overlay::Rock));
        assert_eq!(g.at(Cell::new(9, 9)), None);
    }

    #[test]
    fn raster_order_is_row_major() {
        let g: Grid<Option<BackTile>> = Grid::new(2, 2, None);
        let order: Vec<Cell> = g.positions().collect();
        assert_eq!(
            order,
            vec![
                Cell::new(0, 0),
                Cell::new(1, 0),
                Cell::new(0, 1),
                Cell::new(1, 1)
            ]
        );
    }
}
