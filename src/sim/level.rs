/// Level state machine: install, end, and swap levels.
///
/// ## Lifecycle
///
///   set_map(id)
///     → previous level torn down (`LevelEnded`)
///     → map template cloned, field reset to zeros at the new grid size
///     → map `on_start` hook (maze carving etc.)
///     → players respawned, holdings derived from the starting capital
///     → `LevelStarted`, then the level's on-start scene if any
///
///   exit move → Phase::Won → (win delay) → end_level
///     → on-end rule resolved against flags
///     → scene (swap when it finishes) or straight to schedule
///
///   schedule(id) → flash → set_map(id) once the flash time has passed
///
/// Unknown ids handed to `set_map` are a broken catalog, which `validate`
/// already rules out, so they panic. User-facing selection goes through
/// `select_level`, which refuses unknown names instead.

use crate::domain::entity::PlayerState;
use crate::domain::field::HeightField;
use crate::sim::catalog::{self, Target, MENU};
use crate::sim::dialogue::{Advance, Dialogue};
use crate::sim::event::GameEvent;
use crate::sim::maps::{HeightMap, MapCtx};
use crate::sim::scenes;
use crate::sim::world::{AfterScene, GameState, Party, PendingSwap, Phase};

impl GameState {
    /// Install level `id` right now.
    pub fn set_map(&mut self, id: &str, events: &mut Vec<GameEvent>) {
        let idx = catalog::find(&self.catalog, id)
            .unwrap_or_else(|| panic!("set_map: level `{id}` is not in the catalog"));

        if !self.players.is_empty() {
            let old = self.level_id();
            self.emit(events, GameEvent::LevelEnded { id: old });
        }

        let def = self.catalog[idx].clone();
        log::info!("level: {} ({}x{})", def.id, def.size.0, def.size.1);

        self.level = idx;
        self.map = def.kind.clone();
        self.field = HeightField::new(def.size.0, def.size.1, self.field_cfg);
        self.level_started_at = self.now;
        self.pending = None;
        self.phase = Phase::Playing;
        if let Some(flag) = def.loss_flag {
            self.flags.remove(&flag);
        }

        // a scene from the old level never carries over
        if self.dialogue.is_talking() {
            self.dialogue = Dialogue::new();
            self.emit(events, GameEvent::DialogueEnded);
        }

        {
            let mut ctx = MapCtx {
                field: &mut self.field,
                rng: &mut self.rng,
                dt: 0.0,
                t: 0.0,
                players: &[],
                spectrum: None,
                clock: self.clock,
            };
            self.map.on_start(&mut ctx);
        }

        self.respawn_players();

        let in_party = self.party.as_ref().is_some_and(|p| p.level == def.id);
        if !in_party {
            self.party = None;
        }
        if def.id != MENU && !in_party {
            self.last_level = Some(def.id);
        }

        self.emit(events, GameEvent::LevelStarted { id: def.id, meta: def.meta });
        if let Some(scene) = def.on_start.filter(|_| !in_party) {
            self.start_scene(scene, AfterScene::Resume, events);
        }
    }

    /// Players back to spawn with holdings worth the level's starting capital.
    fn respawn_players(&mut self) {
        let def = &self.catalog[self.level];
        let (w, h) = def.size;
        let count = self.party.as_ref().map(|p| p.players).unwrap_or(1).max(1);

        let spawns: Vec<(usize, usize)> = if count == 1 {
            vec![def.spawn()]
        } else {
            // spread along the spawn row
            let (_, sj) = def.spawn();
            (0..count)
                .map(|k| (((k + 1) * w / (count + 1)).min(w - 1), sj.min(h - 1)))
                .collect()
        };

        let start_capital = def.start_capital as f64;
        let map = &self.map;
        let spawns: Vec<(usize, usize)> = spawns.into_iter()
            .map(|at| nearest_open(at, (w, h), |i, j| map.blocks(i, j)))
            .collect();
        self.players = spawns.into_iter()
            .map(|(i, j)| {
                let price = self.map.height(&self.field, i, j, 0.0).max(1e-3);
                let stocks = (start_capital / price).floor().max(self.trade_cfg.floor_min);
                PlayerState::new(i, j, stocks, price, self.speed.move_interval_ms)
            })
            .collect();
        self.stairs = vec![false; self.players.len()];
    }

    /// Queue a swap behind the screen flash. A second request while one is
    /// pending is dropped.
    pub fn schedule(&mut self, target: &'static str, events: &mut Vec<GameEvent>) {
        if self.pending.is_some() {
            log::debug!("schedule: swap already pending, dropping {target}");
            return;
        }
        self.pending = Some(PendingSwap {
            target,
            started: self.now,
            at: self.now + self.speed.flash_ms,
        });
        self.emit(events, GameEvent::FlashStarted { target });
    }

    /// Land a pending swap whose flash has run out.
    pub(crate) fn land_pending(&mut self, events: &mut Vec<GameEvent>) {
        if let Some(p) = self.pending {
            if self.now >= p.at {
                self.set_map(p.target, events);
            }
        }
    }

    /// Run the current level's on-end rule.
    pub fn end_level(&mut self, events: &mut Vec<GameEvent>) {
        let Target { level, scene } = self.def().on_end.resolve(&self.flags);
        log::info!("level {} ended, next {}", self.level_id(), level);
        self.phase = Phase::Leaving;
        match scene {
            Some(scene) => self.start_scene(scene, AfterScene::Goto(level), events),
            None => self.schedule(level, events),
        }
    }

    /// Menu or command-line jump. Unknown names are refused, not fatal.
    pub fn select_level(&mut self, name: &str, events: &mut Vec<GameEvent>) -> bool {
        match self.catalog.iter().find(|d| d.id == name) {
            Some(def) => {
                let id = def.id;
                self.party = None;
                self.schedule(id, events);
                true
            }
            None => {
                log::warn!("select_level: no level named {name:?}");
                false
            }
        }
    }

    /// Split-screen race on `name` for the configured duration.
    pub fn start_party(&mut self, name: &str, players: usize, events: &mut Vec<GameEvent>) -> bool {
        let Some(def) = self.catalog.iter().find(|d| d.id == name) else {
            log::warn!("start_party: no level named {name:?}");
            return false;
        };
        let level = def.id;
        if self.pending.is_some() {
            log::debug!("start_party: swap already pending, refusing {level}");
            return false;
        }
        let players = players.clamp(1, crate::domain::intent::MAX_PLAYERS);
        self.party = Some(Party {
            level,
            players,
            ends_at: self.now + self.speed.flash_ms + self.speed.party_duration_ms,
        });
        log::info!("party: {players} players on {level}");
        self.emit(events, GameEvent::PartyStarted { level, players });
        self.schedule(level, events);
        true
    }

    // ── Dialogue ──

    pub fn start_scene(&mut self, id: &'static str, after: AfterScene, events: &mut Vec<GameEvent>) {
        let Some(lines) = scenes::scene(id) else {
            // validate() covers catalog scenes; anything else is skipped
            log::warn!("scene {id:?} not found");
            self.finish_scene(after, events);
            return;
        };
        log::info!("scene: {id}");
        let step = self.dialogue.start(id, lines, after);
        self.handle_advance(step, events);
    }

    pub fn advance_dialogue(&mut self, events: &mut Vec<GameEvent>) {
        let step = self.dialogue.advance();
        self.handle_advance(step, events);
    }

    fn handle_advance(&mut self, step: Advance<AfterScene>, events: &mut Vec<GameEvent>) {
        match step {
            Advance::Line(line) => self.emit(events, GameEvent::DialogueLine(line)),
            Advance::Finished(after) => {
                self.emit(events, GameEvent::DialogueEnded);
                self.finish_scene(after, events);
            }
            Advance::Idle => {}
        }
    }

    fn finish_scene(&mut self, after: AfterScene, events: &mut Vec<GameEvent>) {
        match after {
            AfterScene::Resume => {}
            AfterScene::Goto(level) => self.schedule(level, events),
        }
    }
}

/// Closest cell to `at` that is not blocked, by Manhattan distance; ties go
/// to the lower row, then the lower column. `at` itself when nothing is open.
fn nearest_open(
    at: (usize, usize),
    size: (usize, usize),
    blocked: impl Fn(usize, usize) -> bool,
) -> (usize, usize) {
    if !blocked(at.0, at.1) {
        return at;
    }
    let (w, h) = size;
    (0..h)
        .flat_map(|j| (0..w).map(move |i| (i, j)))
        .filter(|&(i, j)| !blocked(i, j))
        .min_by_key(|&(i, j)| (i.abs_diff(at.0) + j.abs_diff(at.1), j, i))
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::nearest_open;
    use crate::config::GameConfig;
    use crate::sim::catalog::MENU;
    use crate::sim::event::GameEvent;
    use crate::sim::world::{GameState, Phase};

    fn state() -> GameState {
        let cfg = GameConfig { seed: Some(7), ..GameConfig::default() };
        GameState::new(&cfg).unwrap()
    }

    #[test]
    fn set_map_resets_grid_players_and_time() {
        let mut s = state();
        let mut ev = vec![];
        s.now = 5000.0;
        s.set_map("checkers", &mut ev);
        assert_eq!(s.level_id(), "checkers");
        assert_eq!(s.grid_size(), (16, 16));
        assert_eq!(s.player_position(), (8, 8));
        assert_eq!(s.level_time(), 0.0);
        assert_eq!(s.last_level, Some("checkers"));
        assert!(matches!(ev[0], GameEvent::LevelEnded { id: "menu" }));
        assert!(matches!(ev[1], GameEvent::LevelStarted { id: "checkers", .. }));
    }

    #[test]
    fn starting_capital_matches_capital_range_floor() {
        let mut s = state();
        let mut ev = vec![];
        for id in ["tutorial", "spiral", "maze", "mountain", "sharks"] {
            s.set_map(id, &mut ev);
            let cap = s.player_capital();
            // floor(floor(C / h) · h) ≤ C, within one price step below
            let h = s.current_height(s.players[0].i, s.players[0].j);
            assert!(cap <= 1000 && cap as f64 > 1000.0 - h - 1.0, "{id}: {cap}");
            assert_eq!(s.players[0].buy_price, h);
        }
    }

    #[test]
    #[should_panic(expected = "not in the catalog")]
    fn unknown_set_map_panics() {
        let mut s = state();
        s.set_map("atlantis", &mut vec![]);
    }

    #[test]
    fn select_unknown_level_is_refused() {
        let mut s = state();
        let mut ev = vec![];
        assert!(!s.select_level("atlantis", &mut ev));
        assert!(s.pending.is_none());
        assert!(ev.is_empty());
    }

    #[test]
    fn schedule_waits_for_the_flash() {
        let mut s = state();
        let mut ev = vec![];
        s.schedule("swirl", &mut ev);
        assert_eq!(s.flash(), Some(0.0));
        s.now = s.speed.flash_ms - 1.0;
        s.land_pending(&mut ev);
        assert_eq!(s.level_id(), "menu");
        s.now = s.speed.flash_ms;
        s.land_pending(&mut ev);
        assert_eq!(s.level_id(), "swirl");
        assert!(s.pending.is_none());
    }

    #[test]
    fn on_start_scene_begins_talking() {
        let mut s = state();
        let mut ev = vec![];
        s.set_map("tutorial", &mut ev);
        assert!(s.is_talking());
        assert!(ev.iter().any(|e| matches!(e, GameEvent::DialogueLine(_))));
    }

    #[test]
    fn end_level_with_scene_swaps_after_last_line() {
        let mut s = state();
        let mut ev = vec![];
        s.set_map("equalizer", &mut ev);
        s.end_level(&mut ev);
        assert_eq!(s.phase, Phase::Leaving);
        assert!(s.is_talking());
        while s.is_talking() {
            assert!(s.pending.is_none());
            s.advance_dialogue(&mut ev);
        }
        assert_eq!(s.pending.map(|p| p.target), Some("menu"));
    }

    #[test]
    fn party_spreads_players() {
        let mut s = state();
        let mut ev = vec![];
        assert!(s.start_party("spiral", 3, &mut ev));
        s.now = s.speed.flash_ms;
        s.land_pending(&mut ev);
        assert_eq!(s.players.len(), 3);
        assert_eq!(s.players[0].position(), (5, 10));
        assert_eq!(s.players[2].position(), (15, 10));
        assert!(!s.is_talking(), "party skips intro scenes");
        assert!(s.party.is_some());
    }

    #[test]
    fn party_players_never_spawn_in_maze_walls() {
        for seed in 0..8 {
            for n in 1..=4 {
                let cfg = GameConfig { seed: Some(seed), ..GameConfig::default() };
                let mut s = GameState::new(&cfg).unwrap();
                let mut ev = vec![];
                assert!(s.start_party("maze", n, &mut ev));
                s.now = s.speed.flash_ms;
                s.land_pending(&mut ev);
                assert_eq!(s.players.len(), n);
                for (p, player) in s.players.iter().enumerate() {
                    let (i, j) = player.position();
                    assert!(!s.blocked(i, j), "seed {seed} n {n}: player {p} in wall at ({i},{j})");
                    assert!(player.buy_price < 2.5);
                }
            }
        }
    }

    #[test]
    fn nearest_open_prefers_closest_cell() {
        let wall = |i: usize, j: usize| i == 2 || (i, j) == (1, 0);
        assert_eq!(nearest_open((0, 0), (4, 3), wall), (0, 0));
        assert_eq!(nearest_open((2, 1), (4, 3), wall), (1, 1));
        assert_eq!(nearest_open((1, 0), (4, 3), wall), (0, 0));
        assert_eq!(nearest_open((0, 0), (2, 2), |_, _| true), (0, 0));
    }

    #[test]
    fn leaving_mid_scene_drops_the_scene() {
        let mut s = state();
        let mut ev = vec![];
        s.set_map("tutorial", &mut ev);
        assert!(s.is_talking());
        s.schedule(MENU, &mut ev);
        s.now = s.speed.flash_ms;
        let mut ev = vec![];
        s.land_pending(&mut ev);
        assert_eq!(s.level_id(), MENU);
        assert!(!s.is_talking());
        assert!(s.dialogue_line().is_none());
        assert!(ev.contains(&GameEvent::DialogueEnded));
    }

    #[test]
    fn unfinished_end_scene_cannot_redirect_the_menu() {
        let mut s = state();
        let mut ev = vec![];
        s.set_map("equalizer", &mut ev);
        s.end_level(&mut ev);
        assert!(s.is_talking());
        s.set_map(MENU, &mut ev);
        assert!(!s.is_talking());
        s.advance_dialogue(&mut ev);
        assert!(s.pending.is_none());
        assert_eq!(s.level_id(), MENU);
    }

    #[test]
    fn party_is_refused_while_a_swap_is_pending() {
        let mut s = state();
        let mut ev = vec![];
        s.schedule("spiral", &mut ev);
        let mut ev = vec![];
        assert!(!s.start_party("swirl", 2, &mut ev));
        assert!(s.party.is_none());
        assert!(ev.is_empty());
        assert_eq!(s.pending.map(|p| p.target), Some("spiral"));
    }
}
