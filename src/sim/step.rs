/// The step function: advances the game by one frame.
///
/// Processing order:
///   1. Clock: dt from the previous frame, `now` recorded
///   2. Pending level swap lands once its flash has run out
///   3. One-shot requests (level select, party, back)
///   4. Dialogue gating: while a scene runs, actions advance it and moves
///      are suppressed
///   5. Map update (field step, agents, feeds)
///   6. Actions (pump, menu start)
///   7. Movement + trade resolution, exit move
///   8. Stairs (capital threshold)
///   9. Timers: win delay → on_end, party countdown
///
/// Heights are sampled only after step 5, so every trade in a frame sees the
/// same surface the renderer draws.

use crate::domain::intent::InputSnapshot;
use crate::domain::trade;
use super::catalog::MENU;
use super::event::GameEvent;
use super::maps::{HeightMap, MapCtx};
use super::party;
use super::world::{GameState, Phase};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(state: &mut GameState, now: f64, input: &InputSnapshot) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();

    let now = now.max(state.now);
    let dt = state.last_tick.map(|last| (now - last).max(0.0)).unwrap_or(0.0);
    state.last_tick = Some(now);
    state.now = now;

    state.land_pending(&mut events);
    resolve_requests(state, input, &mut events);
    let talking = resolve_dialogue(state, input, &mut events);
    update_map(state, dt);
    if !talking {
        resolve_actions(state, input, &mut events);
    }
    resolve_movement(state, dt, input, talking, &mut events);
    resolve_stairs(state, &mut events);
    resolve_win_timer(state, &mut events);
    party::resolve_party(state, &mut events);

    events
}

fn can_play(state: &GameState) -> bool {
    state.phase == Phase::Playing && state.pending.is_none()
}

// ══════════════════════════════════════════════════════════════
// Requests
// ══════════════════════════════════════════════════════════════

fn resolve_requests(state: &mut GameState, input: &InputSnapshot, events: &mut Vec<GameEvent>) {
    if let Some(name) = &input.select_level {
        state.select_level(name, events);
    }
    if let Some(name) = &input.start_party {
        let players = state.party_players;
        state.start_party(name, players, events);
    }
    if input.back && state.level_id() != MENU {
        state.party = None;
        state.phase = Phase::Leaving;
        state.schedule(MENU, events);
    }
}

// ══════════════════════════════════════════════════════════════
// Dialogue
// ══════════════════════════════════════════════════════════════

/// Returns whether a scene is still running after this frame's input.
fn resolve_dialogue(state: &mut GameState, input: &InputSnapshot, events: &mut Vec<GameEvent>) -> bool {
    if !state.is_talking() {
        return false;
    }
    if input.advance_dialogue || input.any_action() {
        state.advance_dialogue(events);
    }
    // the press that closed a scene must not also pump or start anything
    true
}

// ══════════════════════════════════════════════════════════════
// Map update
// ══════════════════════════════════════════════════════════════

fn update_map(state: &mut GameState, dt: f64) {
    let positions: Vec<(usize, usize)> = state.players.iter().map(|p| p.position()).collect();
    let spectrum = state.spectrum.take();
    let t = state.level_time();
    let mut ctx = MapCtx {
        field: &mut state.field,
        rng: &mut state.rng,
        dt,
        t,
        players: &positions,
        spectrum: spectrum.as_deref(),
        clock: state.clock,
    };
    state.map.update(&mut ctx);
}

// ══════════════════════════════════════════════════════════════
// Actions
// ══════════════════════════════════════════════════════════════

fn resolve_actions(state: &mut GameState, input: &InputSnapshot, events: &mut Vec<GameEvent>) {
    if !can_play(state) {
        return;
    }
    if state.def().win_capital.is_none() {
        // the menu: any action starts (or resumes) the campaign
        if input.any_action() {
            let target = state.last_level
                .unwrap_or_else(|| state.def().on_end.resolve(&state.flags).level);
            state.phase = Phase::Leaving;
            state.schedule(target, events);
        }
        return;
    }
    for p in 0..state.players.len() {
        if input.actions.get(p).copied().unwrap_or(false) {
            let at = state.players[p].position();
            state.map.on_action(&mut state.field, at);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Movement + trade
// ══════════════════════════════════════════════════════════════

fn resolve_movement(
    state: &mut GameState,
    dt: f64,
    input: &InputSnapshot,
    talking: bool,
    events: &mut Vec<GameEvent>,
) {
    let frozen = talking || !can_play(state);

    for p in 0..state.players.len() {
        let dir = input.moves.get(p).copied().unwrap_or_default();
        let held = !frozen && !dir.is_none();
        if !state.players[p].battery.tick(dt, held) {
            continue;
        }

        if dir.dx < 0 && state.players[p].i == 0 && exit_open(state, p) {
            log::info!("player {p} took the exit on {}", state.level_id());
            state.phase = Phase::Won { player: p, since: state.now };
            events.push(GameEvent::Won { player: p });
            return;
        }

        let (w, h) = state.grid_size();
        let Some((ti, tj)) = state.players[p].target(dir, w, h) else { continue };
        if state.blocked(ti, tj) {
            continue;
        }
        trade_move(state, p, (ti, tj), events);
    }
}

/// Move player `p` to `to`, selling at the old cell and buying at the new.
fn trade_move(state: &mut GameState, p: usize, to: (usize, usize), events: &mut Vec<GameEvent>) {
    let (i, j) = state.players[p].position();
    let h0 = state.current_height(i, j);
    let h1 = state.current_height(to.0, to.1);
    let player = &state.players[p];
    let r = trade::trade(player.stocks, player.buy_price, h0, h1, &state.trade_cfg);

    if r.effect < 0.0 {
        if let Some(flag) = state.def().loss_flag {
            state.flags.insert(flag);
        }
    }

    let player = &mut state.players[p];
    player.i = to.0;
    player.j = to.1;
    player.stocks = r.stocks;
    player.buy_price = r.buy_price;

    events.push(GameEvent::Trade { player: p, i: to.0, j: to.1, effect: r.effect });
}

/// Exit rule: a winnable level outside party mode, capital at threshold,
/// standing within one row of spawn.
fn exit_open(state: &GameState, p: usize) -> bool {
    if state.party.is_some() {
        return false;
    }
    let Some(threshold) = state.def().win_capital else { return false };
    let (_, spawn_j) = state.def().spawn();
    state.players[p].j.abs_diff(spawn_j) <= 1 && state.capital_of(p) >= threshold
}

// ══════════════════════════════════════════════════════════════
// Stairs + timers
// ══════════════════════════════════════════════════════════════

fn resolve_stairs(state: &mut GameState, events: &mut Vec<GameEvent>) {
    if state.party.is_some() || state.pending.is_some() {
        return;
    }
    let Some(threshold) = state.def().win_capital else { return };
    for p in 0..state.players.len() {
        let above = state.capital_of(p) >= threshold;
        if above && !state.stairs[p] {
            events.push(GameEvent::StairsShown { player: p });
        }
        state.stairs[p] = above;
    }
}

fn resolve_win_timer(state: &mut GameState, events: &mut Vec<GameEvent>) {
    if let Phase::Won { since, .. } = state.phase {
        if state.now - since >= state.speed.win_delay_ms {
            state.end_level(events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::entity::MoveDir;
    use crate::sim::catalog::Flag;
    use std::f64::consts::PI;

    // column 1 of the tutorials peaks (1.5) and troughs (0.5) here
    const PEAK: f64 = PI / 2.0 / 0.002;
    const TROUGH: f64 = 3.0 * PI / 2.0 / 0.002;

    fn state() -> GameState {
        let cfg = GameConfig { seed: Some(3), ..GameConfig::default() };
        GameState::new(&cfg).unwrap()
    }

    fn idle() -> InputSnapshot {
        InputSnapshot::default()
    }

    fn skip_dialogue(s: &mut GameState, now: f64) {
        let mut adv = idle();
        adv.advance_dialogue = true;
        while s.is_talking() {
            step(s, now, &adv);
        }
        step(s, now, &idle());
    }

    fn tutorial() -> GameState {
        let mut s = state();
        s.set_map("tutorial", &mut vec![]);
        skip_dialogue(&mut s, 0.0);
        s
    }

    #[test]
    fn buy_high_sell_low_loses_holdings() {
        let mut s = tutorial();
        assert_eq!(s.players[0].stocks, 1000.0);

        let ev = step(&mut s, PEAK, &InputSnapshot::moving(MoveDir::RIGHT));
        assert_eq!(s.player_position(), (1, 0));
        assert!((s.players[0].buy_price - 1.5).abs() < 1e-6);
        assert_eq!(s.players[0].stocks, 666.0);
        assert!(ev.iter().any(|e| matches!(e, GameEvent::Trade { i: 1, j: 0, .. })));

        step(&mut s, PEAK + 20.0, &idle());
        let ev = step(&mut s, TROUGH, &InputSnapshot::moving(MoveDir::LEFT));
        assert_eq!(s.player_position(), (0, 0));
        assert!(s.players[0].stocks < 1000.0);
        assert!((332.0..=333.0).contains(&s.players[0].stocks));
        assert!(ev.iter().any(|e| matches!(e, GameEvent::Trade { effect, .. } if *effect < 0.0)));
        assert!(s.flags.contains(&Flag::TutorialLoss));
    }

    #[test]
    fn buy_low_sell_high_then_exit_reaches_spiral() {
        let mut s = tutorial();

        step(&mut s, TROUGH, &InputSnapshot::moving(MoveDir::RIGHT));
        step(&mut s, TROUGH + 20.0, &idle());
        let next_peak = TROUGH + PI / 0.002;
        let ev = step(&mut s, next_peak, &idle());
        assert!(s.player_capital() >= 2000);
        assert!(ev.iter().any(|e| matches!(e, GameEvent::StairsShown { player: 0 })));

        step(&mut s, next_peak + 20.0, &InputSnapshot::moving(MoveDir::LEFT));
        step(&mut s, next_peak + 40.0, &idle());
        assert_eq!(s.player_position(), (0, 0));
        assert!(s.player_capital() >= 2000);

        let t = next_peak + 60.0;
        let ev = step(&mut s, t, &InputSnapshot::moving(MoveDir::LEFT));
        assert!(ev.iter().any(|e| matches!(e, GameEvent::Won { player: 0 })));
        assert!(matches!(s.phase, Phase::Won { .. }));

        step(&mut s, t + 500.0, &idle());
        assert!(!s.is_talking(), "on_end waits for the win delay");
        step(&mut s, t + 1000.0, &idle());
        assert!(s.is_talking(), "tutorial_win scene");
        skip_dialogue(&mut s, t + 1000.0);
        assert_eq!(s.pending.map(|p| p.target), Some("spiral"));
        step(&mut s, t + 2000.0, &idle());
        assert_eq!(s.level_id(), "spiral");
    }

    #[test]
    fn exit_refused_below_threshold() {
        let mut s = tutorial();
        let ev = step(&mut s, 10.0, &InputSnapshot::moving(MoveDir::LEFT));
        assert!(ev.is_empty());
        assert_eq!(s.phase, Phase::Playing);
        assert_eq!(s.player_position(), (0, 0));
    }

    #[test]
    fn held_direction_moves_at_interval_cadence() {
        let mut s = state();
        s.set_map("checkers", &mut vec![]);
        let start = s.player_position();
        let right = InputSnapshot::moving(MoveDir::RIGHT);
        let mut now = 0.0;
        // 1 + floor(600 / 150) moves while held for 600 ms
        while now <= 600.0 {
            step(&mut s, now, &right);
            now += 10.0;
        }
        let moved = s.player_position().0 - start.0;
        assert!((4..=6).contains(&moved), "moved {moved}");
    }

    #[test]
    fn moves_are_suppressed_while_talking() {
        let mut s = state();
        s.set_map("tutorial", &mut vec![]);
        assert!(s.is_talking());
        step(&mut s, 0.0, &InputSnapshot::moving(MoveDir::RIGHT));
        assert_eq!(s.player_position(), (0, 0));
    }

    #[test]
    fn dialogue_completes_after_n_advances() {
        let mut s = state();
        s.set_map("tutorial", &mut vec![]);
        let n = crate::sim::scenes::scene("tutorial_intro").unwrap().len();
        let mut adv = idle();
        adv.advance_dialogue = true;
        let mut ended = 0;
        for k in 0..n {
            assert!(s.is_talking(), "ended early at {k}");
            let ev = step(&mut s, 0.0, &adv);
            ended += ev.iter().filter(|e| **e == GameEvent::DialogueEnded).count();
        }
        assert!(!s.is_talking());
        assert_eq!(ended, 1);
    }

    #[test]
    fn menu_action_starts_campaign_or_resumes() {
        let mut s = state();
        let mut fire = idle();
        fire.actions[0] = true;
        step(&mut s, 0.0, &fire);
        assert_eq!(s.pending.map(|p| p.target), Some("tutorial"));

        let mut s = state();
        s.last_level = Some("maze");
        step(&mut s, 0.0, &fire);
        assert_eq!(s.pending.map(|p| p.target), Some("maze"));
    }

    #[test]
    fn maze_walls_refuse_moves() {
        let mut s = state();
        s.set_map("maze", &mut vec![]);
        skip_dialogue(&mut s, 0.0);
        assert_eq!(s.player_position(), (1, 1));
        // the outer ring is always wall
        step(&mut s, 20.0, &InputSnapshot::moving(MoveDir::UP));
        assert_eq!(s.player_position(), (1, 1));
    }

    #[test]
    fn pump_action_disturbs_the_field() {
        let mut s = state();
        s.set_map("pumping", &mut vec![]);
        skip_dialogue(&mut s, 0.0);
        let mut fire = idle();
        fire.actions[0] = true;
        step(&mut s, 16.0, &fire);
        step(&mut s, 32.0, &idle());
        let (i, j) = s.player_position();
        assert!(s.current_height(i, j) < 1.0);
    }

    #[test]
    fn party_runs_out_and_returns_to_menu() {
        let mut s = state();
        let mut go = idle();
        go.start_party = Some("swirl".into());
        step(&mut s, 0.0, &go);
        let flash = s.speed.flash_ms;
        step(&mut s, flash, &idle());
        assert_eq!(s.level_id(), "swirl");
        assert_eq!(s.players.len(), s.party_players);

        let end = s.party.as_ref().unwrap().ends_at;
        let ev = step(&mut s, end, &idle());
        let ranking = ev.iter().find_map(|e| match e {
            GameEvent::PartyFinished { ranking } => Some(ranking.clone()),
            _ => None,
        });
        assert_eq!(ranking.map(|r| r.len()), Some(s.party_players));

        step(&mut s, end + party::RESULTS_MS, &idle());
        step(&mut s, end + party::RESULTS_MS + flash, &idle());
        assert_eq!(s.level_id(), MENU);
        assert!(s.party.is_none());
    }

    #[test]
    fn back_returns_to_menu() {
        let mut s = state();
        s.set_map("spiral", &mut vec![]);
        let mut back = idle();
        back.back = true;
        step(&mut s, 0.0, &back);
        let flash = s.speed.flash_ms;
        step(&mut s, flash, &idle());
        assert_eq!(s.level_id(), MENU);
    }

    #[test]
    fn back_during_intro_leaves_no_scene_on_the_menu() {
        let mut s = state();
        s.set_map("tutorial", &mut vec![]);
        assert!(s.is_talking());
        let mut back = idle();
        back.back = true;
        step(&mut s, 0.0, &back);
        let flash = s.speed.flash_ms;
        step(&mut s, flash, &idle());
        assert_eq!(s.level_id(), MENU);
        assert!(!s.is_talking());

        let mut fire = idle();
        fire.actions[0] = true;
        step(&mut s, flash + 20.0, &fire);
        assert!(s.pending.is_some(), "menu action starts the campaign");
    }

    #[test]
    fn diagonal_move_is_one_trade() {
        let mut s = state();
        s.set_map("checkers", &mut vec![]);
        let (i, j) = s.player_position();
        let (stocks, buy) = (s.players[0].stocks, s.players[0].buy_price);

        let now = 300.0;
        let ev = step(&mut s, now, &InputSnapshot::moving(MoveDir::new(1, 1)));
        let trades: Vec<&GameEvent> = ev.iter()
            .filter(|e| matches!(e, GameEvent::Trade { .. }))
            .collect();
        assert_eq!(trades.len(), 1);
        assert!(matches!(trades[0], GameEvent::Trade { player: 0, i: ti, j: tj, .. } if *ti == i + 1 && *tj == j + 1));
        assert_eq!(s.player_position(), (i + 1, j + 1));

        let expected = trade::trade(
            stocks,
            buy,
            s.current_height(i, j),
            s.current_height(i + 1, j + 1),
            &s.trade_cfg,
        );
        assert_eq!(s.players[0].stocks, expected.stocks);
        assert_eq!(s.players[0].buy_price, expected.buy_price);
    }

    #[test]
    fn time_never_runs_backwards() {
        let mut s = state();
        step(&mut s, 100.0, &idle());
        step(&mut s, 50.0, &idle());
        assert_eq!(s.now, 100.0);
    }

    #[test]
    fn every_level_survives_a_minute_of_ticks() {
        let ids: Vec<&str> = state().catalog.iter().map(|d| d.id).collect();
        for id in ids {
            let mut s = state();
            s.set_map(id, &mut vec![]);
            let mut now = 0.0;
            while now < 60_000.0 {
                s.feed_spectrum(&[0.5, 0.2, 0.9]);
                step(&mut s, now, &InputSnapshot::moving(MoveDir::new(1, 1)));
                now += 100.0;
            }
            let (w, h) = s.grid_size();
            for j in 0..h {
                for i in 0..w {
                    assert!(s.current_height(i, j).is_finite(), "{id}");
                }
            }
        }
    }
}
