/// Gamepad input tracker using gilrs.
///
/// Each pad is bound to a player slot in the order it first sends input,
/// so pad one plays alongside the keyboard as player 1 and further pads
/// join party mode as players 2..4.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Movement
///   A / X                 →  Action (pump, start)
///   Start                 →  Advance dialogue
///   Select                →  Back to menu

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::domain::entity::MoveDir;
use crate::domain::intent::{InputEvent, InputQueue, MAX_PLAYERS};

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,      // LeftTrigger
    R1,      // RightTrigger
    L2,      // LeftTrigger2
    R2,      // RightTrigger2
    Start,
    Select,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER"  => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "L2" | "LT" | "LEFTTRIGGER2"  => Some(Btn::L2),
            "R2" | "RT" | "RIGHTTRIGGER2" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South     => Some(Btn::A),
            Button::East      => Some(Btn::B),
            Button::West      => Some(Btn::X),
            Button::North     => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::LeftTrigger2  => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start     => Some(Btn::Start),
            Button::Select    => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Per-button edge state, cleared every `update()`.
#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    just_pressed: bool,
}

/// Action-to-button mapping (loaded from config).
#[derive(Debug)]
struct ActionMap {
    action: Vec<Btn>,
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            action:  vec![Btn::A, Btn::X],
            confirm: vec![Btn::Start],
            cancel:  vec![Btn::Select],
        }
    }
}

/// One physical pad. Directions are indexed left, right, up, down.
#[derive(Clone, Debug, Default)]
struct Pad {
    id: usize,
    slot: usize,
    buttons: [BtnState; 10],
    dpad: [bool; 4],
    stick_x: f32,
    stick_y: f32,
    reported: [bool; 4],
}

const DIRS: [MoveDir; 4] = [MoveDir::LEFT, MoveDir::RIGHT, MoveDir::UP, MoveDir::DOWN];

impl Pad {
    fn held(&self) -> [bool; 4] {
        [
            self.dpad[0] || self.stick_x < -STICK_DEADZONE,
            self.dpad[1] || self.stick_x > STICK_DEADZONE,
            self.dpad[2] || self.stick_y > STICK_DEADZONE,
            self.dpad[3] || self.stick_y < -STICK_DEADZONE,
        ]
    }

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[b as usize].just_pressed)
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    pads: Vec<Pad>,
    action_map: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = {
            match Gilrs::new() {
                Ok(g) => {
                    let has_pad = g.gamepads().next().is_some();
                    (Some(g), has_pad)
                }
                Err(e) => {
                    log::warn!("gamepad support unavailable: {e}");
                    (None, false)
                }
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            pads: Vec::new(),
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Load button mapping from config. Empty or unparseable lists keep
    /// the defaults.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        fn parse_list(names: &[String]) -> Vec<Btn> {
            names.iter().filter_map(|s| Btn::from_name(s)).collect()
        }
        let map = &mut self.action_map;
        let ac = parse_list(&cfg.action);
        if !ac.is_empty() { map.action = ac; }
        let cf = parse_list(&cfg.confirm);
        if !cf.is_empty() { map.confirm = cf; }
        let ca = parse_list(&cfg.cancel);
        if !ca.is_empty() { map.cancel = ca; }
    }

    pub fn update(&mut self) {
        for pad in &mut self.pads {
            for b in &mut pad.buttons { b.just_pressed = false; }
        }

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    /// Pad for gilrs id `id`, bound to the next free slot on first sight.
    fn pad_mut(&mut self, id: usize) -> Option<&mut Pad> {
        if let Some(k) = self.pads.iter().position(|p| p.id == id) {
            return self.pads.get_mut(k);
        }
        if self.pads.len() >= MAX_PLAYERS {
            return None;
        }
        let slot = self.pads.len();
        log::info!("gamepad {id} joined as player {}", slot + 1);
        self.pads.push(Pad { id, slot, ..Pad::default() });
        self.pads.last_mut()
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = &mut self.gilrs else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            let id = usize::from(event.id);
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    if let Some(pad) = self.pad_mut(id) { set_button(pad, btn, true); }
                }
                EventType::ButtonReleased(btn, _) => {
                    if let Some(pad) = self.pad_mut(id) { set_button(pad, btn, false); }
                }
                EventType::AxisChanged(axis, value, _) => {
                    self.connected = true;
                    if let Some(pad) = self.pad_mut(id) {
                        match axis {
                            Axis::LeftStickX => pad.stick_x = value,
                            Axis::LeftStickY => pad.stick_y = value,
                            _ => {}
                        }
                    }
                }
                EventType::Connected => { self.connected = true; }
                EventType::Disconnected => {
                    if let Some(pad) = self.pads.iter_mut().find(|p| p.id == id) {
                        // keep the slot; just let go of everything
                        let slot = pad.slot;
                        let reported = pad.reported;
                        *pad = Pad { id, slot, reported, ..Pad::default() };
                    }
                    self.connected = !self.pads.is_empty();
                }
                _ => {}
            }
        }
    }

    /// Push this frame's pad intents into the queue.
    pub fn push_intents(&mut self, queue: &mut InputQueue) {
        let map = &self.action_map;
        for pad in &mut self.pads {
            let held = pad.held();
            for k in 0..4 {
                if held[k] != pad.reported[k] {
                    pad.reported[k] = held[k];
                    queue.push(InputEvent::Direction { player: pad.slot, dir: DIRS[k], held: held[k] });
                }
            }
            if pad.any_just_pressed(&map.action) {
                queue.push(InputEvent::Action { player: pad.slot });
            }
            if pad.any_just_pressed(&map.confirm) {
                queue.push(InputEvent::AdvanceDialogue);
            }
        }
    }

    /// Forget reported directions so anything still held is re-sent after
    /// the queue was cleared.
    pub fn reset(&mut self) {
        for pad in &mut self.pads {
            pad.reported = [false; 4];
        }
    }

    /// Cancel on any pad.
    pub fn cancel_pressed(&self) -> bool {
        self.pads.iter().any(|p| p.any_just_pressed(&self.action_map.cancel))
    }
}

#[cfg(feature = "gamepad")]
fn set_button(pad: &mut Pad, btn: Button, held: bool) {
    let dpad = match btn {
        Button::DPadLeft => Some(0),
        Button::DPadRight => Some(1),
        Button::DPadUp => Some(2),
        Button::DPadDown => Some(3),
        _ => None,
    };
    if let Some(k) = dpad {
        pad.dpad[k] = held;
        return;
    }
    if let Some(b) = Btn::from_gilrs(btn) {
        if held { pad.buttons[b as usize].just_pressed = true; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pads() -> GamepadState {
        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: None,
            pads: Vec::new(),
            action_map: ActionMap::default(),
            connected: false,
        }
    }

    #[test]
    fn button_names_parse_loosely() {
        assert_eq!(Btn::from_name("south"), Some(Btn::A));
        assert_eq!(Btn::from_name("RB"), Some(Btn::R1));
        assert_eq!(Btn::from_name("Back"), Some(Btn::Select));
        assert_eq!(Btn::from_name("Turbo"), None);
    }

    #[test]
    fn config_overrides_only_valid_lists() {
        let mut g = pads();
        g.load_button_config(&GamepadConfig {
            action: vec!["Y".into()],
            confirm: vec!["nonsense".into()],
            cancel: vec![],
        });
        assert_eq!(g.action_map.action, vec![Btn::Y]);
        assert_eq!(g.action_map.confirm, vec![Btn::Start]);
        assert_eq!(g.action_map.cancel, vec![Btn::Select]);
    }

    #[test]
    fn pads_take_slots_in_arrival_order() {
        let mut g = pads();
        g.pad_mut(17);
        g.pad_mut(3);
        g.pad_mut(17);
        assert_eq!(g.pads.len(), 2);
        assert_eq!(g.pads[1].slot, 1);
        for id in 100..110 { g.pad_mut(id); }
        assert_eq!(g.pads.len(), MAX_PLAYERS);
    }

    #[test]
    fn stick_and_buttons_become_intents() {
        let mut g = pads();
        g.pad_mut(5);
        g.pad_mut(6);
        if let Some(p) = g.pad_mut(6) {
            p.stick_x = 0.9;
            p.buttons[Btn::A as usize].just_pressed = true;
        }
        let mut q = InputQueue::new();
        g.push_intents(&mut q);
        let s = q.snapshot();
        assert_eq!(s.moves[1], MoveDir::RIGHT);
        assert!(s.actions[1]);
        assert!(s.moves[0].is_none());
    }

    #[test]
    fn button_edges_last_one_update() {
        let mut g = pads();
        if let Some(p) = g.pad_mut(2) { p.buttons[Btn::A as usize].just_pressed = true; }
        g.update();
        let mut q = InputQueue::new();
        g.push_intents(&mut q);
        assert!(!q.snapshot().actions[0], "a press is reported once, not while held");
    }

    #[test]
    fn reset_resends_held_directions() {
        let mut g = pads();
        if let Some(p) = g.pad_mut(1) { p.dpad[2] = true; }
        let mut q = InputQueue::new();
        g.push_intents(&mut q);
        q.snapshot();
        q.release_all();
        assert!(q.snapshot().moves[0].is_none());
        g.reset();
        g.push_intents(&mut q);
        assert_eq!(q.snapshot().moves[0], MoveDir::UP);
    }
}
