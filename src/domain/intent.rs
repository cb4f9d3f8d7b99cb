/// Input intents: the boundary between event-driven input capture and the
/// frame-driven simulation.
///
/// Handlers push discrete `InputEvent`s whenever they fire. Once per tick the
/// simulation calls `InputQueue::snapshot()`, which folds the queue into an
/// immutable `InputSnapshot`. Held directions persist across snapshots until
/// released; one-shot requests are consumed by the snapshot that saw them.

use super::entity::MoveDir;

pub const MAX_PLAYERS: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// A direction went down (`held = true`) or up for one player slot.
    Direction { player: usize, dir: MoveDir, held: bool },
    /// The "pump" / space-bar action.
    Action { player: usize },
    AdvanceDialogue,
    SelectLevel(String),
    /// Split-screen party on the named level.
    StartParty(String),
    Back,
}

/// Read-only view of player intent for exactly one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSnapshot {
    pub moves: [MoveDir; MAX_PLAYERS],
    pub actions: [bool; MAX_PLAYERS],
    pub advance_dialogue: bool,
    pub select_level: Option<String>,
    pub start_party: Option<String>,
    pub back: bool,
}

impl InputSnapshot {
    /// Snapshot with only player 0 holding `dir`. Handy for drivers and tests.
    pub fn moving(dir: MoveDir) -> Self {
        let mut s = InputSnapshot::default();
        s.moves[0] = dir;
        s
    }

    pub fn any_action(&self) -> bool {
        self.actions.iter().any(|a| *a)
    }
}

/// Pending events plus the persistent set of held directions.
#[derive(Clone, Debug, Default)]
pub struct InputQueue {
    pending: Vec<InputEvent>,
    held: [Vec<MoveDir>; MAX_PLAYERS],
}

impl InputQueue {
    pub fn new() -> Self {
        InputQueue::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.pending.push(event);
    }

    /// Drop every held direction, e.g. when the terminal loses focus.
    pub fn release_all(&mut self) {
        for h in &mut self.held {
            h.clear();
        }
    }

    /// Fold pending events into this tick's snapshot.
    pub fn snapshot(&mut self) -> InputSnapshot {
        let mut snap = InputSnapshot::default();

        for event in self.pending.drain(..) {
            match event {
                InputEvent::Direction { player, dir, held } => {
                    let Some(slot) = self.held.get_mut(player) else { continue };
                    slot.retain(|d| *d != dir);
                    if held {
                        slot.push(dir);
                    }
                }
                InputEvent::Action { player } => {
                    if let Some(a) = snap.actions.get_mut(player) {
                        *a = true;
                    }
                }
                InputEvent::AdvanceDialogue => snap.advance_dialogue = true,
                InputEvent::SelectLevel(name) => snap.select_level = Some(name),
                InputEvent::StartParty(name) => snap.start_party = Some(name),
                InputEvent::Back => snap.back = true,
            }
        }

        for (p, dirs) in self.held.iter().enumerate() {
            snap.moves[p] = dirs.iter().fold(MoveDir::NONE, |acc, d| acc.combine(*d));
        }
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_direction_persists_until_released() {
        let mut q = InputQueue::new();
        q.push(InputEvent::Direction { player: 0, dir: MoveDir::RIGHT, held: true });
        assert_eq!(q.snapshot().moves[0], MoveDir::RIGHT);
        assert_eq!(q.snapshot().moves[0], MoveDir::RIGHT);
        q.push(InputEvent::Direction { player: 0, dir: MoveDir::RIGHT, held: false });
        assert!(q.snapshot().moves[0].is_none());
    }

    #[test]
    fn two_axes_fold_into_a_diagonal() {
        let mut q = InputQueue::new();
        q.push(InputEvent::Direction { player: 1, dir: MoveDir::UP, held: true });
        q.push(InputEvent::Direction { player: 1, dir: MoveDir::LEFT, held: true });
        let s = q.snapshot();
        assert_eq!(s.moves[1], MoveDir::new(-1, -1));
        assert!(s.moves[0].is_none());
    }

    #[test]
    fn one_shot_requests_are_consumed() {
        let mut q = InputQueue::new();
        q.push(InputEvent::Action { player: 0 });
        q.push(InputEvent::AdvanceDialogue);
        q.push(InputEvent::SelectLevel("maze".into()));
        let s = q.snapshot();
        assert!(s.any_action());
        assert!(s.advance_dialogue);
        assert_eq!(s.select_level.as_deref(), Some("maze"));
        let s = q.snapshot();
        assert!(!s.any_action());
        assert!(!s.advance_dialogue);
        assert!(s.select_level.is_none());
    }

    #[test]
    fn repeated_press_does_not_double_count() {
        let mut q = InputQueue::new();
        for _ in 0..3 {
            q.push(InputEvent::Direction { player: 0, dir: MoveDir::DOWN, held: true });
        }
        assert_eq!(q.snapshot().moves[0], MoveDir::DOWN);
    }

    #[test]
    fn unknown_player_slot_is_ignored() {
        let mut q = InputQueue::new();
        q.push(InputEvent::Direction { player: 9, dir: MoveDir::DOWN, held: true });
        q.push(InputEvent::Action { player: 9 });
        let s = q.snapshot();
        assert!(!s.any_action());
        assert!(s.moves.iter().all(|m| m.is_none()));
    }
}
