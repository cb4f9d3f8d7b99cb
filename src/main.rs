/// Entry point and game loop.

mod config;
mod domain;
mod error;
mod sim;
mod ui;

use std::fs::File;
use std::time::{Duration, Instant};

use chrono::Timelike;

use config::GameConfig;
use domain::intent::{InputEvent, InputQueue};
use sim::catalog::{self, MENU};
use sim::event::GameEvent;
use sim::save::{self, Options};
use sim::step;
use sim::world::GameState;
use ui::gamepad::GamepadState;
use ui::input::{
    InputState, KEYS_BACK, KEYS_CURSOR_NEXT, KEYS_CURSOR_PREV, KEYS_PARTY, KEYS_QUIT,
    KEYS_SELECT, KEYS_TOGGLE_BLOOM, KEYS_TOGGLE_SOUND,
};
use ui::renderer::{Renderer, View};
use ui::sound::{self as audio, SoundEngine};

const SPECTRUM_BINS: usize = 20;

fn main() {
    let config = GameConfig::load();
    init_logging(&config);

    let mut state = match GameState::new(&config) {
        Ok(s) => s,
        Err(e) => {
            log::error!("level graph is broken: {e}");
            eprintln!("Level graph is broken: {e}");
            std::process::exit(1);
        }
    };

    let options = match save::load() {
        Ok(o) => o,
        Err(e) => {
            log::warn!("could not read options, using defaults: {e}");
            Options::default()
        }
    };
    if let Some(name) = &options.last_level {
        state.last_level = catalog::find(&state.catalog, name).map(|k| state.catalog[k].id);
    }

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();
    let result = game_loop(&mut state, &mut renderer, sound.as_ref(), options, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        log::error!("game loop aborted: {e}");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for trading. Last level: {}", state.last_level.unwrap_or(catalog::FIRST_LEVEL));
}

/// The terminal belongs to the renderer, so logs go to a file.
fn init_logging(config: &GameConfig) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    );
    match File::create(&config.log_file) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            // no writable log location: stay silent rather than scribble on the screen
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
    log::info!("hft {} starting, log at {}", env!("CARGO_PKG_VERSION"), config.log_file.display());
}

/// Front-end state: menu cursor and the persisted toggles.
struct Front {
    options: Options,
    level_names: Vec<&'static str>,
    cursor: usize,
}

impl Front {
    fn selected(&self) -> Option<&'static str> {
        self.level_names.get(self.cursor).copied()
    }

    fn persist(&self) {
        if let Err(e) = save::store(&self.options) {
            log::warn!("could not write options: {e}");
        }
    }
}

fn game_loop(
    state: &mut GameState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    options: Options,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = renderer.key_release;
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let mut queue = InputQueue::new();

    let mut front = Front {
        options,
        level_names: state.catalog.iter().map(|d| d.id).filter(|id| *id != MENU).collect(),
        cursor: 0,
    };
    if let Some(k) = state.last_level.and_then(|l| front.level_names.iter().position(|n| *n == l)) {
        front.cursor = k;
    }

    let started = Instant::now();
    let frame = Duration::from_millis(config.speed.frame_ms);
    let mut music: Option<&'static str> = None;
    if front.options.sound {
        music = state.def().meta.music;
        if let (Some(sfx), Some(key)) = (sound, music) { sfx.play_music(key); }
    }

    loop {
        let frame_start = Instant::now();
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() || kb.any_pressed(KEYS_QUIT) {
            break;
        }
        handle_meta(state, &mut front, sound, &kb, &gp, &mut queue);

        kb.push_intents(&mut queue);
        gp.push_intents(&mut queue);

        let now = started.elapsed().as_secs_f64() * 1000.0;
        let (hour, minute) = clock_reading(&chrono::Local::now());
        state.feed_clock(hour, minute);
        if let Some(key) = state.def().meta.music {
            state.feed_spectrum(&audio::music_spectrum(key, state.level_time(), SPECTRUM_BINS));
        }

        let snapshot = queue.snapshot();
        let events = step::step(state, now, &snapshot);

        for e in &events {
            if let GameEvent::LevelStarted { id, meta } = e {
                kb.reset(&mut queue);
                gp.reset();
                if *id != MENU && state.party.is_none() {
                    front.options.last_level = Some(id.to_string());
                    front.persist();
                }
                if meta.music != music {
                    music = meta.music;
                    if let Some(sfx) = sound {
                        match music {
                            Some(key) if front.options.sound => sfx.play_music(key),
                            _ => sfx.stop_music(),
                        }
                    }
                }
            }
        }
        if front.options.sound {
            process_sound_events(sound, &events);
        }
        renderer.note_events(&events, now);

        let view = View {
            level_names: &front.level_names,
            menu_cursor: front.cursor,
            bloom: front.options.bloom,
            sound: front.options.sound,
            gamepad: gp.connected,
        };
        renderer.render(state, &view)?;

        let spent = frame_start.elapsed();
        if spent < frame {
            std::thread::sleep(frame - spent);
        }
    }

    Ok(())
}

/// Keys the simulation never sees: menu cursor, toggles, level jumps.
fn handle_meta(
    state: &GameState,
    front: &mut Front,
    sound: Option<&SoundEngine>,
    kb: &InputState,
    gp: &GamepadState,
    queue: &mut InputQueue,
) {
    if kb.any_pressed(KEYS_BACK) || gp.cancel_pressed() {
        queue.push(InputEvent::Back);
    }
    if kb.any_pressed(KEYS_TOGGLE_SOUND) {
        front.options.sound = !front.options.sound;
        if let Some(sfx) = sound {
            match state.def().meta.music {
                Some(key) if front.options.sound => sfx.play_music(key),
                _ => sfx.stop_music(),
            }
        }
        front.persist();
    }
    if kb.any_pressed(KEYS_TOGGLE_BLOOM) {
        front.options.bloom = !front.options.bloom;
        front.persist();
    }

    if state.level_id() != MENU || front.level_names.is_empty() {
        return;
    }
    let n = front.level_names.len();
    if kb.any_pressed(KEYS_CURSOR_NEXT) {
        front.cursor = (front.cursor + 1) % n;
    }
    if kb.any_pressed(KEYS_CURSOR_PREV) {
        front.cursor = (front.cursor + n - 1) % n;
    }
    if let Some(name) = front.selected() {
        if kb.any_pressed(KEYS_SELECT) {
            queue.push(InputEvent::SelectLevel(name.to_string()));
        } else if kb.any_pressed(KEYS_PARTY) {
            queue.push(InputEvent::StartParty(name.to_string()));
        }
    }
}

fn process_sound_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    for event in events {
        match event {
            GameEvent::Trade { effect, .. } => sfx.play_trade(*effect),
            GameEvent::StairsShown { .. } => sfx.play_stairs(),
            GameEvent::Won { .. } => sfx.play_clear(),
            GameEvent::FlashStarted { .. } => sfx.play_flash(),
            GameEvent::DialogueLine(line) => sfx.play_dialogue(line.side == sim::dialogue::Side::Left),
            GameEvent::PartyFinished { .. } => sfx.play_party_over(),
            _ => {}
        }
    }
}

/// (hour, minute) of a wall-clock reading, in whatever zone it carries.
fn clock_reading(t: &impl Timelike) -> (u32, u32) {
    (t.hour(), t.minute())
}
