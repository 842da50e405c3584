/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use config::GameConfig;
use domain::tile::Direction;
use sim::event::MoveEvent;
use sim::level::{self, LevelDef};
use sim::step;
use sim::world::WorldState;
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')];

fn main() {
    let config = GameConfig::load();

    let levels = match level::load_levels(&config) {
        Ok(defs) if !defs.is_empty() => defs,
        Ok(_) => {
            eprintln!("No levels found.");
            return;
        }
        Err(e) => {
            eprintln!("Level load failed: {e}");
            return;
        }
    };

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = if config.sound { SoundEngine::new() } else { None };

    let result = game_loop(&levels, &mut renderer, sound.as_ref(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    match result {
        Ok(outro) => {
            println!();
            println!("{outro}");
        }
        Err(e) => eprintln!("Game error: {e}"),
    }
}

fn game_loop(
    levels: &[LevelDef],
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);

    let repeat_delay = Duration::from_millis(config.input.repeat_delay_ms);
    let repeat_rate = Duration::from_millis(config.input.repeat_rate_ms);

    let mut level_idx = 0;
    let mut world = level::build_world(&levels[level_idx])?;
    let mut status = level_status(&world, level_idx, levels.len());

    // Held-key auto repeat: armed by a fresh press, re-fires while the
    // same direction stays held.
    let mut repeat_dir: Option<Direction> = None;
    let mut next_repeat = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() || kb.any_pressed(KEYS_QUIT) || gp.cancel_pressed() {
            return Ok("Good night.".into());
        }
        if kb.any_pressed(KEYS_RESTART) || gp.restart_pressed() {
            world = level::build_world(&levels[level_idx])?;
            status = level_status(&world, level_idx, levels.len());
            repeat_dir = None;
        }

        let held = held_dir(&kb, &gp);
        let mut dir = pressed_dir(&kb, &gp);
        if let Some(d) = dir {
            repeat_dir = Some(d);
            next_repeat = Instant::now() + repeat_delay;
        } else if repeat_dir.is_some() && held == repeat_dir {
            if Instant::now() >= next_repeat {
                next_repeat = Instant::now() + repeat_rate;
                dir = repeat_dir;
            }
        } else {
            repeat_dir = None;
        }

        if let Some(d) = dir {
            let out = step::step(&mut world, d);
            play_events(sound, &out.events);

            if out.lost {
                if let Some(sfx) = sound {
                    sfx.play_snore();
                }
                renderer.render(&world, "Back to bed...")?;
                std::thread::sleep(Duration::from_millis(1200));
                return Ok("The sleeper crawled back into bed. Good night.".into());
            }
            if out.won {
                if let Some(sfx) = sound {
                    sfx.play_clear();
                }
                renderer.render(&world, "Level clear!")?;
                std::thread::sleep(Duration::from_millis(900));

                level_idx += 1;
                if level_idx >= levels.len() {
                    return Ok("Every level cleared. Sweet dreams!".into());
                }
                world = level::build_world(&levels[level_idx])?;
                status = level_status(&world, level_idx, levels.len());
                repeat_dir = None;
            }
        }

        if gp.connected {
            renderer.render(&world, &format!("{status} · pad"))?;
        } else {
            renderer.render(&world, &status)?;
        }
        std::thread::sleep(FRAME_SLEEP);
    }
}

fn level_status(world: &WorldState, idx: usize, total: usize) -> String {
    match world.warnings.first() {
        Some(w) => format!("warning: {w}"),
        None => format!("level {} of {}", idx + 1, total),
    }
}

fn pressed_dir(kb: &InputState, gp: &GamepadState) -> Option<Direction> {
    if kb.any_pressed(KEYS_UP) || gp.dir_pressed(Direction::Up) {
        Some(Direction::Up)
    } else if kb.any_pressed(KEYS_DOWN) || gp.dir_pressed(Direction::Down) {
        Some(Direction::Down)
    } else if kb.any_pressed(KEYS_LEFT) || gp.dir_pressed(Direction::Left) {
        Some(Direction::Left)
    } else if kb.any_pressed(KEYS_RIGHT) || gp.dir_pressed(Direction::Right) {
        Some(Direction::Right)
    } else {
        None
    }
}

fn held_dir(kb: &InputState, gp: &GamepadState) -> Option<Direction> {
    if kb.any_held(KEYS_UP) || gp.dir_held(Direction::Up) {
        Some(Direction::Up)
    } else if kb.any_held(KEYS_DOWN) || gp.dir_held(Direction::Down) {
        Some(Direction::Down)
    } else if kb.any_held(KEYS_LEFT) || gp.dir_held(Direction::Left) {
        Some(Direction::Left)
    } else if kb.any_held(KEYS_RIGHT) || gp.dir_held(Direction::Right) {
        Some(Direction::Right)
    } else {
        None
    }
}

fn play_events(sound: Option<&SoundEngine>, events: &[MoveEvent]) {
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    for event in events {
        match event {
            MoveEvent::WalkStep { left_foot: true } => sfx.play_step_left(),
            MoveEvent::WalkStep { left_foot: false } => sfx.play_step_right(),
            MoveEvent::Slide => sfx.play_slide(),
            MoveEvent::Teleport => sfx.play_warp(),
            MoveEvent::Fall => sfx.play_fall(),
        }
    }
}
