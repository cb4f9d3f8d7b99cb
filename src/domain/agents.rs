/// Moving agents that some maps sample into their height function.
///
///   - `SharkSwarm`: predators steered toward the player, repelled by each
///     other, velocity normalized to a fixed speed, explicit Euler.
///   - `Ball`: rolls over an elevation table: gradient descent blended with
///     pursuit of the player, with friction.
///
/// Every normalization divides by `max(MIN_DIST, length)` so coincident
/// agents or an agent sitting on the player never produce NaN.

use glam::DVec2;

pub const MIN_DIST: f64 = 0.01;

const SHARK_SPEED: f64 = 0.002;   // cells per ms
const SHARK_REPEL: f64 = 1.5;

#[derive(Clone, Debug)]
pub struct Shark {
    pub pos: DVec2,
    pub vel: DVec2,
}

#[derive(Clone, Debug)]
pub struct SharkSwarm {
    pub sharks: Vec<Shark>,
    bounds: DVec2,
}

/// `v / max(MIN_DIST, |v|)`.
fn safe_normalize(v: DVec2) -> DVec2 {
    v / v.length().max(MIN_DIST)
}

impl SharkSwarm {
    /// One shark per corner of a `w × h` grid (up to `count`, at most four).
    pub fn new(count: usize, w: usize, h: usize) -> Self {
        let max = DVec2::new(w.saturating_sub(1) as f64, h.saturating_sub(1) as f64);
        let corners = [
            DVec2::ZERO,
            DVec2::new(max.x, 0.0),
            DVec2::new(0.0, max.y),
            max,
        ];
        SharkSwarm {
            sharks: corners.iter().take(count.min(4))
                .map(|&pos| Shark { pos, vel: DVec2::ZERO })
                .collect(),
            bounds: max,
        }
    }

    /// Advance `dt` ms toward `target`.
    pub fn update(&mut self, dt: f64, target: DVec2) {
        let positions: Vec<DVec2> = self.sharks.iter().map(|s| s.pos).collect();

        for (k, shark) in self.sharks.iter_mut().enumerate() {
            let attract = safe_normalize(target - shark.pos);
            let mut repel = DVec2::ZERO;
            for (m, other) in positions.iter().enumerate() {
                if m == k { continue; }
                let away = shark.pos - *other;
                let d = away.length().max(MIN_DIST);
                repel += away / (d * d * d); // unit direction / d²
            }
            let dir = attract + repel * SHARK_REPEL;
            shark.vel = safe_normalize(dir) * SHARK_SPEED;
            shark.pos = (shark.pos + shark.vel * dt).clamp(DVec2::ZERO, self.bounds);
        }
    }

    /// Closest distance from any shark to `p`.
    #[cfg(test)]
    pub fn nearest(&self, p: DVec2) -> f64 {
        self.sharks.iter()
            .map(|s| s.pos.distance(p))
            .fold(f64::INFINITY, f64::min)
    }
}

const BALL_GRAVITY: f64 = 0.000_004;
const BALL_PURSUIT: f64 = 0.000_001_5;
const BALL_FRICTION: f64 = 0.98;
const BALL_MAX_SPEED: f64 = 0.01;

/// A ball rolling on a sampled elevation surface.
#[derive(Clone, Debug)]
pub struct Ball {
    pub pos: DVec2,
    pub vel: DVec2,
}

impl Ball {
    pub fn new(pos: DVec2) -> Self {
        Ball { pos, vel: DVec2::ZERO }
    }

    /// `elevation(i, j)` must clamp its own indices. `bounds` is the max cell.
    pub fn update<F>(&mut self, dt: f64, target: DVec2, bounds: DVec2, elevation: F)
    where
        F: Fn(i64, i64) -> f64,
    {
        let (i, j) = (self.pos.x.round() as i64, self.pos.y.round() as i64);
        let grad = DVec2::new(
            (elevation(i + 1, j) - elevation(i - 1, j)) * 0.5,
            (elevation(i, j + 1) - elevation(i, j - 1)) * 0.5,
        );
        let acc = -grad * BALL_GRAVITY + safe_normalize(target - self.pos) * BALL_PURSUIT;
        self.vel = (self.vel * BALL_FRICTION + acc * dt).clamp_length_max(BALL_MAX_SPEED);
        self.pos += self.vel * dt;

        // bounce off the rim
        if self.pos.x < 0.0 || self.pos.x > bounds.x { self.vel.x = -self.vel.x; }
        if self.pos.y < 0.0 || self.pos.y > bounds.y { self.vel.y = -self.vel.y; }
        self.pos = self.pos.clamp(DVec2::ZERO, bounds);
    }
}
