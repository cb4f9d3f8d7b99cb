/// Entities: the trading player and its movement cadence.

/// Grid direction of one discrete step. Diagonals are two axis steps
/// folded into one move.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct MoveDir {
    pub dx: i32,
    pub dy: i32,
}

impl MoveDir {
    pub const NONE: MoveDir = MoveDir { dx: 0, dy: 0 };
    pub const LEFT: MoveDir = MoveDir { dx: -1, dy: 0 };
    pub const RIGHT: MoveDir = MoveDir { dx: 1, dy: 0 };
    pub const UP: MoveDir = MoveDir { dx: 0, dy: -1 };
    pub const DOWN: MoveDir = MoveDir { dx: 0, dy: 1 };

    pub fn new(dx: i32, dy: i32) -> Self {
        MoveDir { dx: dx.signum(), dy: dy.signum() }
    }

    pub fn is_none(self) -> bool {
        self.dx == 0 && self.dy == 0
    }

    /// Combine two held directions; opposite keys cancel.
    pub fn combine(self, other: MoveDir) -> MoveDir {
        MoveDir::new(self.dx + other.dx, self.dy + other.dy)
    }
}

/// The "key battery": charge accumulates while a direction is held and one
/// step is released per `interval` of charge. Holding for `D` ms yields
/// `1 + floor(D / interval)` steps, the first one immediately.
#[derive(Clone, Debug)]
pub struct MoveBattery {
    charge: f64,
    interval: f64,
}

impl MoveBattery {
    pub fn new(interval: f64) -> Self {
        let interval = interval.max(1.0);
        MoveBattery { charge: interval, interval }
    }

    /// Feed one frame. Returns true if a step fires this frame.
    pub fn tick(&mut self, dt: f64, held: bool) -> bool {
        if !held {
            self.charge = self.interval;
            return false;
        }
        self.charge += dt.max(0.0);
        if self.charge >= self.interval {
            // keep the remainder so cadence doesn't drift, but never bank a second step
            self.charge = (self.charge - self.interval).min(self.interval);
            true
        } else {
            false
        }
    }

    /// The battery starts (and idles) full so a tap moves at once.
    #[cfg(test)]
    pub fn is_charged(&self) -> bool {
        self.charge >= self.interval
    }
}

/// One trader on the grid.
///
/// `capital` is deliberately absent: it is `floor(stocks · h(i, j, now))`,
/// recomputed whenever it is read.
#[derive(Clone, Debug)]
pub struct PlayerState {
    pub i: usize,
    pub j: usize,
    pub stocks: f64,
    pub buy_price: f64,
    pub battery: MoveBattery,
}

impl PlayerState {
    pub fn new(i: usize, j: usize, stocks: f64, buy_price: f64, move_interval: f64) -> Self {
        PlayerState {
            i, j,
            stocks,
            buy_price,
            battery: MoveBattery::new(move_interval),
        }
    }

    pub fn position(&self) -> (usize, usize) {
        (self.i, self.j)
    }

    /// Destination of `dir` applied per axis, each axis refused on its own when
    /// it would leave `[0, w) × [0, h)`. Returns None if nothing moves.
    pub fn target(&self, dir: MoveDir, w: usize, h: usize) -> Option<(usize, usize)> {
        let ni = self.i as i64 + dir.dx as i64;
        let nj = self.j as i64 + dir.dy as i64;
        let ti = if ni >= 0 && ni < w as i64 { ni as usize } else { self.i };
        let tj = if nj >= 0 && nj < h as i64 { nj as usize } else { self.j };
        if (ti, tj) == (self.i, self.j) { None } else { Some((ti, tj)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_moves_immediately() {
        let mut b = MoveBattery::new(150.0);
        assert!(b.is_charged());
        assert!(b.tick(16.0, true));
        assert!(!b.tick(16.0, true));
    }

    #[test]
    fn held_direction_is_paced_by_interval() {
        for &(frame, duration) in &[(16.0, 1500.0), (7.0, 3000.0), (33.0, 990.0), (150.0, 1500.0)] {
            let mut b = MoveBattery::new(150.0);
            let mut moves = 0i64;
            let mut t = 0.0;
            while t < duration {
                if b.tick(frame, true) { moves += 1; }
                t += frame;
            }
            let expected = (duration / 150.0).floor() as i64;
            assert!((moves - expected).abs() <= 1, "frame {frame}: {moves} vs {expected}");
        }
    }

    #[test]
    fn release_recharges() {
        let mut b = MoveBattery::new(150.0);
        assert!(b.tick(16.0, true));
        assert!(!b.tick(16.0, false));
        assert!(b.tick(16.0, true));
    }

    #[test]
    fn long_frame_never_banks_two_steps() {
        let mut b = MoveBattery::new(150.0);
        assert!(b.tick(1000.0, true));
        assert!(b.tick(0.0, true));
        assert!(!b.tick(0.0, true));
    }

    #[test]
    fn target_refuses_each_axis_independently() {
        let p = PlayerState::new(0, 0, 100.0, 1.0, 150.0);
        assert_eq!(p.target(MoveDir::LEFT, 4, 4), None);
        assert_eq!(p.target(MoveDir::new(-1, 1), 4, 4), Some((0, 1)));
        assert_eq!(p.target(MoveDir::new(1, 1), 4, 4), Some((1, 1)));
        let p = PlayerState::new(3, 3, 100.0, 1.0, 150.0);
        assert_eq!(p.target(MoveDir::new(1, 1), 4, 4), None);
    }

    #[test]
    fn opposite_directions_cancel() {
        assert!(MoveDir::LEFT.combine(MoveDir::RIGHT).is_none());
        assert_eq!(MoveDir::UP.combine(MoveDir::RIGHT), MoveDir::new(1, -1));
    }
}
