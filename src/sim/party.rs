/// Party mode: several traders on one level against the clock.
///
/// No exits, no scenes. When the countdown runs out the players are ranked
/// by capital (ties go to the lower slot), the ranking stays up for
/// `RESULTS_MS`, then the game returns to the menu.

use crate::sim::catalog::MENU;
use crate::sim::event::GameEvent;
use crate::sim::world::{GameState, Phase};

pub const RESULTS_MS: f64 = 5000.0;

/// (player, capital), best first.
pub fn ranking(state: &GameState) -> Vec<(usize, i64)> {
    let mut rows: Vec<(usize, i64)> = (0..state.players.len())
        .map(|p| (p, state.capital_of(p)))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    rows
}

/// Countdown and results timers. Runs once per tick after trading.
pub fn resolve_party(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let Some(party) = state.party.clone() else { return };

    match state.phase {
        Phase::Playing if state.level_id() == party.level && state.pending.is_none() => {
            if state.now >= party.ends_at {
                let ranking = ranking(state);
                log::info!("party over: {:?}", ranking);
                state.phase = Phase::PartyResults { until: state.now + RESULTS_MS };
                events.push(GameEvent::PartyFinished { ranking });
            }
        }
        Phase::PartyResults { until } if state.now >= until => {
            state.phase = Phase::Leaving;
            state.schedule(MENU, events);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn ranking_orders_by_capital_then_slot() {
        let cfg = GameConfig { seed: Some(1), ..GameConfig::default() };
        let mut s = GameState::new(&cfg).unwrap();
        let mut ev = vec![];
        s.start_party("checkers", 3, &mut ev);
        s.now = s.speed.flash_ms;
        s.land_pending(&mut ev);
        s.players[0].stocks = 10.0;
        s.players[1].stocks = 5000.0;
        s.players[2].stocks = 10.0;
        // same row, so equal stocks may still differ by height; pin them together
        s.players[2].i = s.players[0].i;
        let r = ranking(&s);
        assert_eq!(r[0].0, 1);
        assert_eq!(r[1].0, 0);
        assert_eq!(r[2].0, 2);
    }
}
