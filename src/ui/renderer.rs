/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::links::WallRole;
use crate::domain::tile::{Cell as MapCell, Direction, Overlay, WallColor};
use crate::sim::world::WorldState;

/// Terminal columns per map cell; square-ish cells on most fonts.
const CELL_W: usize = 2;
/// Rows above the map: title + blank.
const MAP_ROW: usize = 2;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// gap pixels between rows match the cell color on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 16, b: 32 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel used to invalidate the back buffer: differs from any
    /// real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color) -> Cell {
        Cell { ch, fg, bg: Cell::BASE_BG }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell::new(ch, fg));
            cx += 1;
        }
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &WorldState, status: &str) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        self.front.clear();
        self.compose(world, status);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Frame composition ──

    fn compose(&mut self, world: &WorldState, status: &str) {
        let title = format!("SLEEPWALK · {}   steps {}", world.name, world.steps);
        self.front.put_str(1, 0, &title, Color::White);

        for y in 0..world.background.height() {
            for x in 0..world.background.width() {
                let pos = MapCell::new(x, y);
                let cell = if pos == world.agent {
                    Cell::new(agent_glyph(world.facing), Color::White)
                } else {
                    self.map_glyph(world, pos)
                };
                self.front.set(1 + x as usize * CELL_W, MAP_ROW + y as usize, cell);
            }
        }

        let status_row = MAP_ROW + world.background.height() as usize + 1;
        self.front.put_str(1, status_row, status, Color::Yellow);
        self.front.put_str(
            1,
            status_row + 1,
            "arrows/wasd move · R restart · Esc quit",
            Color::DarkGrey,
        );
    }

    fn map_glyph(&self, world: &WorldState, pos: MapCell) -> Cell {
        if let Some(tile) = world.overlay.at(pos) {
            return match tile {
                // the two segments of a color get different shading so
                // the player can tell which end is which
                Overlay::Wall { color, .. } => {
                    let ch = match world.links.wall_role(pos) {
                        Some(WallRole::B) => '▒',
                        _ => '▓',
                    };
                    Cell::new(ch, wall_color(color))
                }
                Overlay::Box => Cell::new('▣', Color::Yellow),
                Overlay::Rock => Cell::new('◆', Color::DarkYellow),
                Overlay::Goal => Cell::new('◎', Color::Green),
                Overlay::Bed => Cell::new('≡', Color::Cyan),
                Overlay::Blocker => Cell::new('█', Color::DarkGrey),
            };
        }
        if world.holes.at(pos).is_some() {
            return Cell::new('○', Color::Grey);
        }
        match world.background.at(pos) {
            Some(_) => Cell::new('·', Color::DarkGrey),
            None => Cell::BLANK,
        }
    }

    // ── Diff flush ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut fg = Color::Reset;
        let mut bg = Color::Reset;
        let mut first = true;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.cells[y * self.front.width + x];
                if cell == self.back.cells[y * self.back.width + x] {
                    continue;
                }
                queue!(self.writer, MoveTo(x as u16, y as u16))?;
                if first || cell.fg != fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    fg = cell.fg;
                }
                if first || cell.bg != bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    bg = cell.bg;
                }
                first = false;
                queue!(self.writer, Print(cell.ch))?;
            }
        }

        self.writer.flush()
    }
}

fn agent_glyph(facing: Direction) -> char {
    match facing {
        Direction::Up => '▲',
        Direction::Down => '▼',
        Direction::Left => '◀',
        Direction::Right => '▶',
    }
}

fn wall_color(color: WallColor) -> Color {
    match color {
        WallColor::Blue => Color::Blue,
        WallColor::Purple => Color::Magenta,
        WallColor::Red => Color::Red,
        WallColor::Orange => Color::Rgb { r: 255, g: 150, b: 40 },
    }
}
