/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.txt` files, name-sorted;
///      each file may hold several levels separated by `---`)
///   2. Built-in embedded levels
///
/// ## Level format:
///   ```text
///   # Level Name
///   role first|middle|last
///   wall <glyph> <color> <growth> <exit>
///   bg:
///   <rows: '.' floor, ' ' void>
///   ov:
///   <rows: '.' empty, '#' blocker, 'o' box, 'r' rock,
///          'g' goal, 'd' bed, 'P' spawn, declared wall glyphs>
///   holes:
///   <rows: '.' empty, any other glyph is a hole tag>
///   ```
///
/// Directives come before the row sections. `role` defaults to middle.
/// Each `wall` line binds one overlay glyph to a color plus the segment's
/// growth and exit directions; the two segments of a color normally use
/// distinct glyphs so their exits can differ.
///
/// Loading is strict: a level that cannot be linked is an error, not a
/// level that silently misbehaves at the first teleport.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::GameConfig;
use crate::domain::links::{LinkError, LinkTable};
use crate::domain::rules::{self, MapView};
use crate::domain::tile::{BackTile, Cell, Direction, Grid, HoleTag, Overlay, WallColor};
use crate::sim::world::{AgentRole, WorldState};

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("line {line}: unrecognized directive `{text}`")]
    BadDirective { line: usize, text: String },
    #[error("unknown {layer} glyph `{glyph}` at ({x}, {y})")]
    UnknownGlyph { layer: &'static str, glyph: char, x: i32, y: i32 },
    #[error("level `{name}` has no agent spawn")]
    NoSpawn { name: String },
    #[error("level has no map rows")]
    Empty,
}

/// One overlay glyph bound to a wall segment's metadata.
#[derive(Clone, Copy, Debug)]
struct WallDecl {
    glyph: char,
    color: WallColor,
    growth: Direction,
    exit: Direction,
}

/// Parsed level text, not yet turned into grids. Kept so a restart can
/// rebuild the world from scratch without re-reading files.
pub struct LevelDef {
    pub name: String,
    role: AgentRole,
    walls: Vec<WallDecl>,
    bg: Vec<String>,
    ov: Vec<String>,
    holes: Vec<String>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Parse a single level and build its world. The entry point for tests
/// and for in-memory level text.
pub fn world_from_text(text: &str) -> Result<WorldState, LevelError> {
    build_world(&parse_level(text)?)
}

/// Load the playable level list: the levels directory if it holds any
/// `.txt` files, the embedded set otherwise.
pub fn load_levels(config: &GameConfig) -> Result<Vec<LevelDef>, LevelError> {
    if config.levels_dir.is_dir() {
        let defs = load_from_directory(&config.levels_dir)?;
        if !defs.is_empty() {
            return Ok(defs);
        }
    }
    embedded_levels()
}

/// Build a fresh world for one level of the list.
pub fn build_world(def: &LevelDef) -> Result<WorldState, LevelError> {
    if def.bg.is_empty() {
        return Err(LevelError::Empty);
    }

    let width = [&def.bg, &def.ov, &def.holes]
        .iter()
        .flat_map(|rows| rows.iter())
        .map(|r| r.chars().count())
        .max()
        .unwrap_or(0) as i32;
    let height = def.bg.len().max(def.ov.len()).max(def.holes.len()) as i32;

    let mut background: Grid<Option<BackTile>> = Grid::new(width, height, None);
    let mut overlay: Grid<Option<Overlay>> = Grid::new(width, height, None);
    let mut holes: Grid<Option<HoleTag>> = Grid::new(width, height, None);
    let mut spawn = None;

    for (pos, glyph) in cells(&def.bg) {
        match glyph {
            '.' => background.set(pos, Some(BackTile::Floor)),
            ' ' => {}
            _ => {
                return Err(LevelError::UnknownGlyph {
                    layer: "background",
                    glyph,
                    x: pos.x,
                    y: pos.y,
                });
            }
        }
    }

    for (pos, glyph) in cells(&def.ov) {
        let tile = match glyph {
            '.' | ' ' => continue,
            '#' => Overlay::Blocker,
            'o' => Overlay::Box,
            'r' => Overlay::Rock,
            'g' => Overlay::Goal,
            'd' => Overlay::Bed,
            'P' => {
                spawn = Some(pos);
                continue;
            }
            _ => match def.walls.iter().find(|w| w.glyph == glyph) {
                Some(w) => Overlay::Wall { color: w.color, growth: w.growth, exit: w.exit },
                None => {
                    return Err(LevelError::UnknownGlyph {
                        layer: "overlay",
                        glyph,
                        x: pos.x,
                        y: pos.y,
                    });
                }
            },
        };
        overlay.set(pos, Some(tile));
    }

    for (pos, glyph) in cells(&def.holes) {
        if glyph != '.' && glyph != ' ' {
            holes.set(pos, Some(HoleTag(glyph)));
        }
    }

    let spawn = spawn.ok_or_else(|| LevelError::NoSpawn { name: def.name.clone() })?;
    let links = LinkTable::build(&overlay, &holes)?;

    // A box resting on one hole of a pair covers the other: seed the
    // coupled cover so fill state is symmetric from the first step.
    for hole in links.hole_cells() {
        if let Some(partner) = links.hole_partner(hole) {
            if overlay.at(partner).map_or(false, Overlay::is_box) && overlay.at(hole).is_none() {
                overlay.set(hole, Some(Overlay::Box));
            }
        }
    }

    let warnings = rules::validate(&MapView {
        background: &background,
        overlay: &overlay,
        holes: &holes,
        links: &links,
        first_agent: def.role.is_first,
    });

    Ok(WorldState {
        name: def.name.clone(),
        background,
        overlay,
        holes,
        links,
        agent: spawn,
        facing: Direction::Down,
        role: def.role,
        left_foot: false,
        steps: 0,
        warnings,
    })
}

// ══════════════════════════════════════════════════════════════
// Parsing
// ══════════════════════════════════════════════════════════════

/// Split `---`-separated text into level definitions. Chunks that are
/// blank (pack headers trimmed away, trailing separators) are skipped.
pub fn parse_pack(text: &str) -> Result<Vec<LevelDef>, LevelError> {
    text.split("\n---")
        .map(|chunk| chunk.trim_start_matches('-'))
        .filter(|chunk| !chunk.trim().is_empty())
        .map(parse_level)
        .collect()
}

enum Section {
    Header,
    Bg,
    Ov,
    Holes,
}

pub fn parse_level(text: &str) -> Result<LevelDef, LevelError> {
    let mut def = LevelDef {
        name: "Unnamed".to_string(),
        role: AgentRole::MIDDLE,
        walls: Vec::new(),
        bg: Vec::new(),
        ov: Vec::new(),
        holes: Vec::new(),
    };
    let mut section = Section::Header;

    for (idx, line) in text.lines().enumerate() {
        match line.trim_end() {
            "bg:" => {
                section = Section::Bg;
                continue;
            }
            "ov:" => {
                section = Section::Ov;
                continue;
            }
            "holes:" => {
                section = Section::Holes;
                continue;
            }
            _ => {}
        }

        match section {
            Section::Header => parse_directive(&mut def, idx + 1, line)?,
            Section::Bg => def.bg.push(line.to_string()),
            Section::Ov => def.ov.push(line.to_string()),
            Section::Holes => def.holes.push(line.to_string()),
        }
    }

    trim_trailing_blank(&mut def.bg);
    trim_trailing_blank(&mut def.ov);
    trim_trailing_blank(&mut def.holes);

    if def.bg.is_empty() {
        return Err(LevelError::Empty);
    }
    Ok(def)
}

fn parse_directive(def: &mut LevelDef, line_no: usize, line: &str) -> Result<(), LevelError> {
    let bad = || LevelError::BadDirective { line: line_no, text: line.to_string() };

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if let Some(name) = trimmed.strip_prefix('#') {
        def.name = name.trim().to_string();
        return Ok(());
    }

    let mut words = trimmed.split_whitespace();
    match words.next() {
        Some("role") => {
            def.role = match words.next() {
                Some("first") => AgentRole::FIRST,
                Some("middle") => AgentRole::MIDDLE,
                Some("last") => AgentRole::LAST,
                _ => return Err(bad()),
            };
        }
        Some("wall") => {
            let glyph = match words.next() {
                Some(w) if w.chars().count() == 1 => w.chars().next().unwrap(),
                _ => return Err(bad()),
            };
            let color = words.next().and_then(parse_color).ok_or_else(bad)?;
            let growth = words.next().and_then(parse_direction).ok_or_else(bad)?;
            let exit = words.next().and_then(parse_direction).ok_or_else(bad)?;
            def.walls.push(WallDecl { glyph, color, growth, exit });
        }
        _ => return Err(bad()),
    }
    if words.next().is_some() {
        return Err(bad());
    }
    Ok(())
}

fn parse_color(word: &str) -> Option<WallColor> {
    match word {
        "blue" => Some(WallColor::Blue),
        "purple" => Some(WallColor::Purple),
        "red" => Some(WallColor::Red),
        "orange" => Some(WallColor::Orange),
        _ => None,
    }
}

fn parse_direction(word: &str) -> Option<Direction> {
    match word {
        "up" => Some(Direction::Up),
        "down" => Some(Direction::Down),
        "left" => Some(Direction::Left),
        "right" => Some(Direction::Right),
        _ => None,
    }
}

fn cells(rows: &[String]) -> impl Iterator<Item = (Cell, char)> + '_ {
    rows.iter().enumerate().flat_map(|(y, row)| {
        row.chars()
            .enumerate()
            .map(move |(x, ch)| (Cell::new(x as i32, y as i32), ch))
    })
}

fn trim_trailing_blank(rows: &mut Vec<String>) {
    while rows.last().map_or(false, |r| r.trim().is_empty()) {
        rows.pop();
    }
}

// ══════════════════════════════════════════════════════════════
// Directory loading
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Result<Vec<LevelDef>, LevelError> {
    let io_err = |source| LevelError::Io { path: dir.to_path_buf(), source };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_err)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().map_or(false, |e| e == "txt"))
        .collect();
    paths.sort();

    let mut defs = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(&path)
            .map_err(|source| LevelError::Io { path: path.clone(), source })?;
        defs.extend(parse_pack(&text)?);
    }
    Ok(defs)
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

const BUILTIN_PACK: &str = "\
# Morning Shuffle
bg:
........
........
........
........
........
ov:
........
..o.....
.Po..g..
..o.....
........
---
# Mirror Walls
wall A blue down right
wall B blue down left
bg:
........
........
........
........
........
........
........
........
ov:
.....A..
P....A..
.....A..
........
...o....
.....B..
..g..B..
.....B..
---
# Pitfalls
bg:
.........
.........
.........
ov:
P..r.....
....o....
......g..
holes:
.1.....1.
.........
.........
---
# Back to Bed
role first
bg:
......
......
ov:
P.o...
....d.
";

fn embedded_levels() -> Result<Vec<LevelDef>, LevelError> {
    parse_pack(BUILTIN_PACK)
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
