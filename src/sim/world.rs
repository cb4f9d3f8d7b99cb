/// GameState: everything the simulation owns.
///
/// ## Time
///
/// The host passes a monotonically increasing `now` (ms) to every tick.
/// Level time is `now - level_started_at`, recomputed on every read and never
/// accumulated, so heights cannot drift. Per-frame `dt` only drives the move
/// battery and map-local animation.
///
/// ## Capital
///
/// Capital is never stored. `capital_of(p)` is `floor(stocks · h)` at the
/// player's cell for the current level time.
///
/// ## Presentation interface
///
/// Read side: `current_height`, `current_field`, `player_position`,
/// `player_capital`, `dialogue_line`, `flash`. Write side: `InputSnapshot`s
/// handed to `step`, plus `feed_spectrum` / `feed_clock`.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{FieldConfig, GameConfig, SpeedConfig, TradeConfig};
use crate::domain::entity::PlayerState;
use crate::domain::field::HeightField;
use crate::domain::trade;
use crate::error::GraphError;
use crate::sim::catalog::{self, Flag, MapDef};
use crate::sim::dialogue::{Dialogue, Line};
use crate::sim::event::GameEvent;
use crate::sim::maps::{HeightMap, MapKind};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Phase {
    Playing,
    /// A player took the exit; `on_end` runs after the win delay.
    Won { player: usize, since: f64 },
    /// `on_end` has run; waiting for a scene or the flash to swap levels.
    Leaving,
    /// Party over; the ranking is on screen until `until`.
    PartyResults { until: f64 },
}

/// What to do when a scene finishes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AfterScene {
    Resume,
    Goto(&'static str),
}

/// A level swap waiting behind the screen flash.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PendingSwap {
    pub target: &'static str,
    pub started: f64,
    pub at: f64,
}

#[derive(Clone, Debug)]
pub struct Party {
    pub level: &'static str,
    pub players: usize,
    pub ends_at: f64,
}

pub struct GameState {
    pub catalog: Vec<MapDef>,
    pub speed: SpeedConfig,
    pub trade_cfg: TradeConfig,
    pub field_cfg: FieldConfig,

    pub level: usize,
    pub map: MapKind,
    pub field: HeightField,
    pub players: Vec<PlayerState>,
    pub phase: Phase,
    pub dialogue: Dialogue<AfterScene>,
    pub flags: HashSet<Flag>,
    pub pending: Option<PendingSwap>,
    /// Per player: capital is at or above the win threshold.
    pub stairs: Vec<bool>,
    pub party: Option<Party>,
    pub party_players: usize,
    /// Last campaign level started; the menu resumes from here.
    pub last_level: Option<&'static str>,

    pub now: f64,
    pub level_started_at: f64,
    pub(crate) last_tick: Option<f64>,
    pub(crate) rng: StdRng,
    pub(crate) spectrum: Option<Vec<f32>>,
    pub(crate) clock: Option<(u32, u32)>,
}

impl GameState {
    /// Validate the shipped catalog and open the menu.
    pub fn new(cfg: &GameConfig) -> Result<Self, GraphError> {
        Self::with_catalog(catalog::catalog(), cfg)
    }

    pub fn with_catalog(defs: Vec<MapDef>, cfg: &GameConfig) -> Result<Self, GraphError> {
        catalog::validate(&defs)?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let first = &defs[0];
        let (w, h) = first.size;

        let mut state = GameState {
            map: first.kind.clone(),
            field: HeightField::new(w, h, cfg.field),
            catalog: defs,
            speed: cfg.speed.clone(),
            trade_cfg: cfg.trade,
            field_cfg: cfg.field,
            level: 0,
            players: vec![],
            phase: Phase::Playing,
            dialogue: Dialogue::new(),
            flags: HashSet::new(),
            pending: None,
            stairs: vec![],
            party: None,
            party_players: cfg.players,
            last_level: None,
            now: 0.0,
            level_started_at: 0.0,
            last_tick: None,
            rng,
            spectrum: None,
            clock: None,
        };
        let start = if catalog::find(&state.catalog, catalog::MENU).is_some() {
            catalog::MENU
        } else {
            state.catalog[0].id
        };
        let mut events = vec![];
        state.set_map(start, &mut events);
        Ok(state)
    }

    // ── Queries ──

    pub fn def(&self) -> &MapDef {
        &self.catalog[self.level]
    }

    pub fn level_id(&self) -> &'static str {
        self.catalog[self.level].id
    }

    /// Level-local time in ms.
    pub fn level_time(&self) -> f64 {
        (self.now - self.level_started_at).max(0.0)
    }

    pub fn current_height(&self, i: usize, j: usize) -> f64 {
        self.map.height(&self.field, i, j, self.level_time())
    }

    pub fn current_field(&self) -> &[f64] {
        self.field.values()
    }

    pub fn grid_size(&self) -> (usize, usize) {
        (self.field.width(), self.field.height())
    }

    pub fn player_position(&self) -> (usize, usize) {
        self.players.first().map(|p| p.position()).unwrap_or((0, 0))
    }

    pub fn player_capital(&self) -> i64 {
        self.capital_of(0)
    }

    pub fn capital_of(&self, player: usize) -> i64 {
        match self.players.get(player) {
            Some(p) => trade::capital(p.stocks, self.current_height(p.i, p.j)),
            None => 0,
        }
    }

    pub fn is_talking(&self) -> bool {
        self.dialogue.is_talking()
    }

    pub fn dialogue_line(&self) -> Option<Line> {
        self.dialogue.current()
    }

    /// Flash progress in [0, 1] while a level swap is pending.
    pub fn flash(&self) -> Option<f64> {
        self.pending.map(|p| {
            let span = (p.at - p.started).max(1.0);
            ((self.now - p.started) / span).clamp(0.0, 1.0)
        })
    }

    /// Remaining party time in ms.
    pub fn party_remaining(&self) -> Option<f64> {
        self.party.as_ref().map(|p| (p.ends_at - self.now).max(0.0))
    }

    pub fn blocked(&self, i: usize, j: usize) -> bool {
        self.map.blocks(i, j)
    }

    // ── Presentation feeds ──

    /// Latest analyser bins in [0, 1]. Consumed by the next tick.
    pub fn feed_spectrum(&mut self, bins: &[f32]) {
        self.spectrum = Some(bins.to_vec());
    }

    /// Local wall-clock (hour, minute).
    pub fn feed_clock(&mut self, hour: u32, minute: u32) {
        self.clock = Some((hour % 24, minute % 60));
    }

    pub(crate) fn emit(&self, events: &mut Vec<GameEvent>, event: GameEvent) {
        log::trace!("event {:?}", event);
        events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> GameState {
        let cfg = GameConfig { seed: Some(42), ..GameConfig::default() };
        GameState::new(&cfg).unwrap()
    }

    #[test]
    fn opens_on_the_menu() {
        let s = seeded();
        assert_eq!(s.level_id(), "menu");
        assert_eq!(s.grid_size(), (20, 20));
        assert_eq!(s.player_position(), (10, 10));
        assert_eq!(s.players.len(), 1);
    }

    #[test]
    fn capital_is_derived_from_stocks_and_height() {
        let mut s = seeded();
        s.now = 777.0;
        let (i, j) = s.player_position();
        let expected = (s.players[0].stocks * s.current_height(i, j)).floor() as i64;
        assert_eq!(s.player_capital(), expected);
        s.players[0].stocks = 10.0;
        assert_eq!(s.player_capital(), (10.0 * s.current_height(i, j)).floor() as i64);
    }

    #[test]
    fn field_is_zeroed_at_level_start() {
        let s = seeded();
        assert!(s.current_field().iter().all(|v| *v == 0.0));
        assert_eq!(s.current_field().len(), 400);
    }

    #[test]
    fn clock_feed_wraps() {
        let mut s = seeded();
        s.feed_clock(25, 61);
        assert_eq!(s.clock, Some((1, 1)));
    }

    #[test]
    fn missing_player_has_no_capital() {
        let s = seeded();
        assert_eq!(s.capital_of(3), 0);
    }
}
