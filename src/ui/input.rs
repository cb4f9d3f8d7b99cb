/// Keyboard input: held-key tracking plus the mapping from keys to intents.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous movement while a key is held (the move battery paces it)
///   - Edge-triggered actions (pump, dialogue advance, menu keys)
///   - Two players on one keyboard: arrows + Space, WASD + F
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
///
/// Held state reaches the simulation as `InputEvent::Direction` transitions,
/// so the `InputQueue` only sees changes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::MoveDir;
use crate::domain::intent::{InputEvent, InputQueue};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// Keyboard players: (left, right, up, down, action).
const LAYOUTS: [[KeyCode; 5]; 2] = [
    [KeyCode::Left, KeyCode::Right, KeyCode::Up, KeyCode::Down, KeyCode::Char(' ')],
    [KeyCode::Char('a'), KeyCode::Char('d'), KeyCode::Char('w'), KeyCode::Char('s'), KeyCode::Char('f')],
];

const DIRS: [MoveDir; 4] = [MoveDir::LEFT, MoveDir::RIGHT, MoveDir::UP, MoveDir::DOWN];

pub const KEYS_ADVANCE: &[KeyCode] = &[KeyCode::Enter];
pub const KEYS_BACK: &[KeyCode] = &[KeyCode::Esc];
pub const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q')];
pub const KEYS_CURSOR_NEXT: &[KeyCode] = &[KeyCode::Tab, KeyCode::PageDown];
pub const KEYS_CURSOR_PREV: &[KeyCode] = &[KeyCode::BackTab, KeyCode::PageUp];
pub const KEYS_SELECT: &[KeyCode] = &[KeyCode::Char('l')];
pub const KEYS_PARTY: &[KeyCode] = &[KeyCode::Char('p')];
pub const KEYS_TOGGLE_SOUND: &[KeyCode] = &[KeyCode::Char('m')];
pub const KEYS_TOGGLE_BLOOM: &[KeyCode] = &[KeyCode::Char('b')];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,

    /// Direction state last reported to the queue, per keyboard player.
    reported: [[bool; 4]; LAYOUTS.len()],
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
            reported: [[false; 4]; LAYOUTS.len()],
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation step.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else { continue };
            self.raw_events.push(key);
            let code = normalize(key.code);

            match key.kind {
                KeyEventKind::Release if self.honor_release => {
                    self.last_active.remove(&code);
                }
                KeyEventKind::Release => {
                    // timeout-based expiry handles it
                }
                _ => {
                    let was_held = self.is_held(code);
                    self.last_active.insert(code, Instant::now());
                    if !was_held {
                        self.fresh_presses.push(code);
                    }
                }
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active.get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// Push this frame's gameplay intents: direction transitions, actions,
    /// dialogue advance.
    pub fn push_intents(&mut self, queue: &mut InputQueue) {
        for (player, keys) in LAYOUTS.iter().enumerate() {
            for (k, dir) in DIRS.iter().enumerate() {
                let held = self.is_held(keys[k]);
                if held != self.reported[player][k] {
                    self.reported[player][k] = held;
                    queue.push(InputEvent::Direction { player, dir: *dir, held });
                }
            }
            if self.was_pressed(keys[4]) {
                queue.push(InputEvent::Action { player });
            }
        }
        if self.any_pressed(KEYS_ADVANCE) {
            queue.push(InputEvent::AdvanceDialogue);
        }
    }

    /// Forget everything held, e.g. across a level swap.
    pub fn reset(&mut self, queue: &mut InputQueue) {
        self.last_active.clear();
        self.reported = [[false; 4]; LAYOUTS.len()];
        queue.release_all();
    }
}

/// Shifted letters count as the letter.
fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_do_not_overlap() {
        let mut all: Vec<KeyCode> = LAYOUTS.iter().flatten().copied().collect();
        all.extend_from_slice(KEYS_ADVANCE);
        all.extend_from_slice(KEYS_QUIT);
        all.extend_from_slice(KEYS_SELECT);
        all.extend_from_slice(KEYS_PARTY);
        all.extend_from_slice(KEYS_TOGGLE_SOUND);
        all.extend_from_slice(KEYS_TOGGLE_BLOOM);
        let n = all.len();
        all.sort_by_key(|k| format!("{k:?}"));
        all.dedup();
        assert_eq!(all.len(), n);
    }

    #[test]
    fn held_key_reports_one_transition_each_way() {
        let mut input = InputState::new();
        let mut q = InputQueue::new();
        input.last_active.insert(KeyCode::Right, Instant::now());
        input.push_intents(&mut q);
        input.push_intents(&mut q);
        assert_eq!(q.snapshot().moves[0], MoveDir::RIGHT);

        input.last_active.clear();
        input.push_intents(&mut q);
        assert!(q.snapshot().moves[0].is_none());
    }

    #[test]
    fn second_player_uses_wasd() {
        let mut input = InputState::new();
        let mut q = InputQueue::new();
        input.last_active.insert(KeyCode::Char('w'), Instant::now());
        input.fresh_presses.push(KeyCode::Char('f'));
        input.push_intents(&mut q);
        let s = q.snapshot();
        assert_eq!(s.moves[1], MoveDir::UP);
        assert!(s.actions[1]);
        assert!(!s.actions[0]);
    }

    #[test]
    fn shifted_letters_normalize() {
        assert_eq!(normalize(KeyCode::Char('W')), KeyCode::Char('w'));
        assert_eq!(normalize(KeyCode::Left), KeyCode::Left);
    }
}
