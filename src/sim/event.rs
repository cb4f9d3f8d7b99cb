/// Events emitted during a simulation step.
/// The presentation layer consumes these for animation/sound.

use crate::sim::catalog::LevelMeta;
use crate::sim::dialogue::Line;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    LevelStarted { id: &'static str, meta: LevelMeta },
    LevelEnded { id: &'static str },
    /// The screen flash that masks a level swap has begun.
    FlashStarted { target: &'static str },
    /// `effect` is signed: positive for a profitable sale.
    Trade { player: usize, i: usize, j: usize, effect: f64 },
    /// Capital crossed the win threshold; the exit is open.
    StairsShown { player: usize },
    Won { player: usize },
    DialogueLine(Line),
    DialogueEnded,
    PartyStarted { level: &'static str, players: usize },
    /// (player, capital), best first.
    PartyFinished { ranking: Vec<(usize, i64)> },
}
