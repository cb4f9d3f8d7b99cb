/// Height maps: one variant per level family.
///
/// Every variant implements `HeightMap`. `height` is pure given
/// `(i, j, t, own state, field)`; `update` runs once per tick before any
/// height is sampled, and is the only place a map mutates its scratch state
/// or the shared `HeightField`. Field-backed maps step the field themselves.
///
/// `t` is level-local milliseconds. Heights are documented per variant and
/// stay roughly within [0, 4].

use std::f64::consts::PI;

use glam::DVec2;
use rand::rngs::StdRng;
use rand::Rng;

use crate::domain::agents::{Ball, SharkSwarm, MIN_DIST};
use crate::domain::field::HeightField;
use crate::domain::glyphs;
use crate::domain::maze::{MazeCell, MazeMask};

/// Everything a map may touch during `on_start` / `update`.
pub struct MapCtx<'a> {
    pub field: &'a mut HeightField,
    pub rng: &'a mut StdRng,
    pub dt: f64,
    pub t: f64,
    pub players: &'a [(usize, usize)],
    /// Fresh analyser bins, if the presentation fed any since last tick.
    pub spectrum: Option<&'a [f32]>,
    /// Local (hour, minute), if the presentation feeds a wall clock.
    pub clock: Option<(u32, u32)>,
}

pub trait HeightMap {
    fn height(&self, field: &HeightField, i: usize, j: usize, t: f64) -> f64;

    fn on_start(&mut self, _ctx: &mut MapCtx) {}

    fn update(&mut self, _ctx: &mut MapCtx) {}

    /// The action button, pressed by a player standing on `at`.
    fn on_action(&mut self, _field: &mut HeightField, _at: (usize, usize)) {}

    /// Impassable cells refuse moves like the grid edge does.
    fn blocks(&self, _i: usize, _j: usize) -> bool { false }
}

fn polar(i: usize, j: usize, cx: f64, cy: f64) -> (f64, f64) {
    let dx = i as f64 - cx;
    let dy = j as f64 - cy;
    ((dx * dx + dy * dy).sqrt(), dy.atan2(dx))
}

fn dist2(i: usize, j: usize, c: DVec2) -> f64 {
    DVec2::new(i as f64, j as f64).distance_squared(c)
}

/// `1 + value`, kept just above zero so prices stay positive.
fn field_height(field: &HeightField, i: usize, j: usize) -> f64 {
    (1.0 + field.get(i as i64, j as i64)).max(0.05)
}

// ══════════════════════════════════════════════════════════════
// Closed-form maps
// ══════════════════════════════════════════════════════════════

/// Menu demo: outward ripples from (10, 10). Range [0.8, 1.2].
#[derive(Clone, Debug)]
pub struct Ripple;

impl HeightMap for Ripple {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let (r, _) = polar(i, j, 10.0, 10.0);
        1.0 + 0.2 * (0.005 * t - 0.5 * r).sin()
    }
}

/// One sine per column: `base + amp · sin(omega · t + phase)`.
#[derive(Clone, Copy, Debug)]
pub struct ColumnWave {
    pub base: f64,
    pub amp: f64,
    pub omega: f64,
    pub phase: f64,
}

impl ColumnWave {
    pub const fn flat(base: f64) -> Self {
        ColumnWave { base, amp: 0.0, omega: 0.0, phase: 0.0 }
    }
}

/// Tutorials: each column oscillates on its own. Range [0.5, 1.5].
#[derive(Clone, Debug)]
pub struct Columns {
    pub columns: Vec<ColumnWave>,
}

impl HeightMap for Columns {
    fn height(&self, _: &HeightField, i: usize, _j: usize, t: f64) -> f64 {
        match self.columns.get(i).or(self.columns.last()) {
            Some(c) => c.base + c.amp * (c.omega * t + c.phase).sin(),
            None => 1.0,
        }
    }
}

/// Rotating three-armed spiral around the grid centre. Range [0.5, 1.5].
#[derive(Clone, Debug)]
pub struct Spiral {
    pub w: usize,
    pub h: usize,
}

impl HeightMap for Spiral {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let (r, theta) = polar(i, j, (self.w / 2) as f64, (self.h / 2) as f64);
        1.0 + 0.5 * (3.0 * theta + 0.5 * r - 0.003 * t).sin()
    }
}

/// Product of travelling sines. Range [0.4, 1.6].
#[derive(Clone, Debug)]
pub struct Checkers;

impl HeightMap for Checkers {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        1.0 + 0.6 * (0.6 * i as f64 + 0.002 * t).sin() * (0.6 * j as f64 - 0.0015 * t).sin()
    }
}

/// Two-armed swirl fading out from (10, 10). Range [0.1, 1.9].
#[derive(Clone, Debug)]
pub struct Swirl;

impl HeightMap for Swirl {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let (r, theta) = polar(i, j, 10.0, 10.0);
        1.0 + 0.9 * (-r * r / 60.0).exp() * (2.0 * theta + 0.4 * r - 0.004 * t).sin()
    }
}

/// Standing pattern whose amplitude breathes, clamped. Range [0.3, 2].
#[derive(Clone, Debug)]
pub struct Mask;

impl HeightMap for Mask {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let v = 1.0 + 2.0 * (0.8 * i as f64).sin() * (0.8 * j as f64).cos() * (0.001 * t).sin();
        v.clamp(0.3, 2.0)
    }
}

/// Interference of three sources tracing Lissajous curves. Range [0.1, 1.9].
#[derive(Clone, Debug)]
pub struct Lissajous {
    pub w: usize,
    pub h: usize,
}

impl Lissajous {
    const CURVES: [(f64, f64, f64); 3] = [(1.0, 2.0, 0.0), (3.0, 2.0, PI / 2.0), (2.0, 3.0, PI / 3.0)];

    fn centre(&self, k: usize, t: f64) -> DVec2 {
        let (a, b, delta) = Self::CURVES[k];
        let cx = self.w as f64 / 2.0;
        let cy = self.h as f64 / 2.0;
        let w = 0.0004 * t;
        DVec2::new(cx + 0.4 * self.w as f64 * (a * w + delta).sin(), cy + 0.4 * self.h as f64 * (b * w).sin())
    }
}

impl HeightMap for Lissajous {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let sum: f64 = (0..Self::CURVES.len())
            .map(|k| (0.8 * dist2(i, j, self.centre(k, t)).sqrt() - 0.005 * t).sin())
            .sum();
        1.0 + 0.3 * sum
    }
}

/// Gaussian bubbles falling down the grid and wrapping. Range [0.6, ~3].
#[derive(Clone, Debug)]
pub struct Bubbles {
    pub w: usize,
    pub h: usize,
}

impl Bubbles {
    const COUNT: usize = 5;

    fn centre(&self, k: usize, t: f64) -> DVec2 {
        let lane = self.w as f64 / Self::COUNT as f64;
        let span = self.h as f64 + 6.0;
        let fall = (t * 0.004 * (1.0 + 0.2 * k as f64) + 4.3 * k as f64).rem_euclid(span);
        DVec2::new(lane * (k as f64 + 0.5), fall - 3.0)
    }
}

impl HeightMap for Bubbles {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let bumps: f64 = (0..Self::COUNT)
            .map(|k| 1.2 * (-dist2(i, j, self.centre(k, t)) / 5.0).exp())
            .sum();
        0.6 + bumps
    }
}

/// Depressions orbiting the centre at different radii. Range [0.1, 1.6].
#[derive(Clone, Debug)]
pub struct Dimples {
    pub w: usize,
    pub h: usize,
}

impl Dimples {
    const ORBITS: [(f64, f64, f64); 4] = [(3.0, 0.0011, 0.0), (6.0, -0.0007, 1.5), (8.0, 0.0005, 3.0), (5.0, 0.0009, 4.5)];

    fn centre(&self, k: usize, t: f64) -> DVec2 {
        let (r, omega, phi) = Self::ORBITS[k];
        let c = DVec2::new(self.w as f64 / 2.0, self.h as f64 / 2.0);
        c + r * DVec2::new((omega * t + phi).cos(), (omega * t + phi).sin())
    }
}

impl HeightMap for Dimples {
    fn height(&self, _: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let dips: f64 = (0..Self::ORBITS.len())
            .map(|k| 0.9 * (-dist2(i, j, self.centre(k, t)) / 6.0).exp())
            .sum();
        (1.6 - dips).max(0.1)
    }
}

// ══════════════════════════════════════════════════════════════
// Field-backed maps
// ══════════════════════════════════════════════════════════════

const PUMP_KICK: f64 = 3.0;
const PLAYER_WEIGHT: f64 = 0.05;

/// Player-driven ripples: standing on a cell weighs it down, the action
/// button pumps a deep dip that rings out. Range [0.05, ~2].
#[derive(Clone, Debug)]
pub struct Pumping;

impl HeightMap for Pumping {
    fn height(&self, field: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        field_height(field, i, j)
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        for &(i, j) in ctx.players {
            let (i, j) = (i as i64, j as i64);
            let v = ctx.field.velocity(i, j);
            ctx.field.set_velocity(i, j, v - PLAYER_WEIGHT);
        }
        ctx.field.step();
    }

    fn on_action(&mut self, field: &mut HeightField, at: (usize, usize)) {
        let (i, j) = (at.0 as i64, at.1 as i64);
        let v = field.velocity(i, j);
        field.set_velocity(i, j, v - PUMP_KICK);
    }
}

const SCRIBBLE_PUMP: f64 = 1.0;
const SCRIBBLE_WALK_MS: f64 = 120.0;

/// A source and a sink random-walking over the field. Range [0.05, ~2].
#[derive(Clone, Debug)]
pub struct Scribbles {
    pub source: (i64, i64),
    pub sink: (i64, i64),
    pub walk_clock: f64,
}

impl Scribbles {
    pub fn new(w: usize, h: usize) -> Self {
        Scribbles {
            source: (w as i64 / 4, h as i64 / 4),
            sink: (3 * w as i64 / 4, 3 * h as i64 / 4),
            walk_clock: 0.0,
        }
    }

    fn walk(p: (i64, i64), rng: &mut StdRng, w: i64, h: i64) -> (i64, i64) {
        let (dx, dy) = match rng.gen_range(0..4) {
            0 => (1, 0),
            1 => (-1, 0),
            2 => (0, 1),
            _ => (0, -1),
        };
        ((p.0 + dx).clamp(0, w - 1), (p.1 + dy).clamp(0, h - 1))
    }
}

impl HeightMap for Scribbles {
    fn height(&self, field: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        field_height(field, i, j)
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        let (w, h) = (ctx.field.width() as i64, ctx.field.height() as i64);
        self.walk_clock += ctx.dt;
        while self.walk_clock >= SCRIBBLE_WALK_MS {
            self.walk_clock -= SCRIBBLE_WALK_MS;
            self.source = Self::walk(self.source, ctx.rng, w, h);
            self.sink = Self::walk(self.sink, ctx.rng, w, h);
        }
        ctx.field.set_velocity(self.source.0, self.source.1, SCRIBBLE_PUMP);
        ctx.field.set_velocity(self.sink.0, self.sink.1, -SCRIBBLE_PUMP);
        ctx.field.step();
    }
}

const MAZE_WALL_HEIGHT: f64 = 2.5;

/// Procedural maze: walls are tall and impassable, corridors carry ripples
/// pumped from the goal cell. Range [0.05, 2.5].
#[derive(Clone, Debug, Default)]
pub struct Maze {
    pub mask: Option<MazeMask>,
}

impl HeightMap for Maze {
    fn height(&self, field: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        match self.mask.as_ref().map(|m| m.at(i, j)) {
            Some(MazeCell::Wall) => MAZE_WALL_HEIGHT,
            _ => field_height(field, i, j),
        }
    }

    fn on_start(&mut self, ctx: &mut MapCtx) {
        let (w, h) = (ctx.field.width(), ctx.field.height());
        self.mask = Some(MazeMask::generate(w, h, ctx.rng));
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        let Some(mask) = &self.mask else { return };
        let goal = (mask.goal.0 as i64, mask.goal.1 as i64);
        ctx.field.set_velocity(goal.0, goal.1, 1.5 * (0.004 * ctx.t).sin());
        ctx.field.step();
        // walls are rigid: corridors act as wave guides
        for j in 0..mask.height {
            for i in 0..mask.width {
                if mask.at(i, j) == MazeCell::Wall {
                    ctx.field.set_value(i as i64, j as i64, 0.0);
                    ctx.field.set_velocity(i as i64, j as i64, 0.0);
                }
            }
        }
    }

    fn blocks(&self, i: usize, j: usize) -> bool {
        self.mask.as_ref().is_some_and(|m| m.at(i, j) == MazeCell::Wall)
    }
}

/// Digitized elevation, 16×16, one digit per cell.
pub const ELEVATION: [&str; 16] = [
    "0011223344332211",
    "0112334455443221",
    "1123445566554322",
    "1234556677665432",
    "1234567788776543",
    "2345678899887654",
    "2345678999987654",
    "2345678898876543",
    "1234567787765432",
    "1233456676654321",
    "1223345565543211",
    "0112234454432100",
    "0011223343321100",
    "0001122232211000",
    "0000111121110000",
    "0000001110000000",
];

fn elevation(i: i64, j: i64) -> f64 {
    let j = j.clamp(0, ELEVATION.len() as i64 - 1) as usize;
    let row = ELEVATION[j].as_bytes();
    let i = i.clamp(0, row.len() as i64 - 1) as usize;
    (row[i].saturating_sub(b'0')) as f64 / 3.0
}

/// Static terrain with a ball that rolls downhill and chases the player,
/// raising a bump where it sits. Range [0.3, ~4].
#[derive(Clone, Debug)]
pub struct Mountain {
    pub ball: Ball,
}

impl Mountain {
    pub fn new() -> Self {
        Mountain { ball: Ball::new(DVec2::new(7.5, 7.5)) }
    }
}

impl HeightMap for Mountain {
    fn height(&self, _: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        let bump = 0.8 * (-dist2(i, j, self.ball.pos) / 3.0).exp();
        0.3 + elevation(i as i64, j as i64) + bump
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        let Some(&(pi, pj)) = ctx.players.first() else { return };
        let bounds = DVec2::new(ELEVATION[0].len() as f64 - 1.0, ELEVATION.len() as f64 - 1.0);
        self.ball.update(ctx.dt, DVec2::new(pi as f64, pj as f64), bounds, elevation);
    }
}

/// Predators dragging the price down wherever they swim. Range [0.1, 2].
#[derive(Clone, Debug)]
pub struct Sharks {
    pub swarm: SharkSwarm,
}

impl HeightMap for Sharks {
    fn height(&self, _: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        let dips: f64 = self.swarm.sharks.iter()
            .map(|s| 1.5 * (-dist2(i, j, s.pos) / 3.0).exp())
            .sum();
        (2.0 - dips).max(0.1)
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        if ctx.players.is_empty() { return; }
        let pts: Vec<DVec2> = ctx.players.iter()
            .map(|&(i, j)| DVec2::new(i as f64, j as f64))
            .collect();
        // chase whichever player is nearest the pack
        let n = self.swarm.sharks.len().max(1) as f64;
        let centroid = self.swarm.sharks.iter().map(|s| s.pos).sum::<DVec2>() / n;
        let target = pts.iter().copied()
            .min_by(|a, b| {
                let da = a.distance(centroid).max(MIN_DIST);
                let db = b.distance(centroid).max(MIN_DIST);
                da.total_cmp(&db)
            })
            .unwrap_or(centroid);
        self.swarm.update(ctx.dt, target);
    }
}

/// A pulsing castle outline pinned into the field. Range [0.05, ~2.2].
#[derive(Clone, Debug)]
pub struct Castle {
    pub cells: Vec<(usize, usize)>,
}

impl Castle {
    pub fn new() -> Self {
        Castle { cells: glyphs::mask_cells(&glyphs::CASTLE) }
    }
}

impl HeightMap for Castle {
    fn height(&self, field: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        field_height(field, i, j)
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        let level = 0.8 + 0.4 * (0.002 * ctx.t).sin();
        for &(i, j) in &self.cells {
            ctx.field.set_value(i as i64, j as i64, level);
        }
        ctx.field.step();
    }
}

/// A live `HH:MM` readout drawn into the field with the 3×6 font.
/// Without a wall-clock feed it shows level-elapsed minutes:seconds.
/// Range [0.05, ~2].
#[derive(Clone, Debug, Default)]
pub struct Clock {
    pub shown: (u32, u32),
}

impl Clock {
    fn reading(ctx: &MapCtx) -> (u32, u32) {
        ctx.clock.unwrap_or_else(|| {
            let secs = (ctx.t.max(0.0) / 1000.0) as u32;
            ((secs / 60) % 60, secs % 60)
        })
    }
}

impl HeightMap for Clock {
    fn height(&self, field: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        field_height(field, i, j)
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        self.shown = Self::reading(ctx);
        for (i, j) in glyphs::clock_cells(self.shown.0, self.shown.1, (0, 1)) {
            ctx.field.set_value(i as i64, j as i64, 1.0);
        }
        ctx.field.step();
    }
}

const BIN_DECAY: f64 = 0.995;

/// Bar chart of external analyser bins: column `i` is lit from the bottom
/// row up to `bin[i] · h` rows. Range [0.3, 2.8].
#[derive(Clone, Debug)]
pub struct Equalizer {
    pub bins: Vec<f64>,
    pub h: usize,
}

impl Equalizer {
    pub fn new(w: usize, h: usize) -> Self {
        Equalizer { bins: vec![0.0; w], h }
    }
}

impl HeightMap for Equalizer {
    fn height(&self, _: &HeightField, i: usize, j: usize, _t: f64) -> f64 {
        let bin = self.bins.get(i).copied().unwrap_or(0.0);
        let row = self.h.saturating_sub(1 + j) as f64;
        let lit = row < bin * self.h as f64;
        0.3 + if lit { 2.5 * bin } else { 0.0 }
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        let decay = BIN_DECAY.powf(ctx.dt / 16.0);
        for b in &mut self.bins {
            *b *= decay;
        }
        let Some(spectrum) = ctx.spectrum else { return };
        if spectrum.is_empty() { return; }
        let n = self.bins.len();
        for (k, b) in self.bins.iter_mut().enumerate() {
            // resample the analyser onto our columns
            let src = (k * spectrum.len() / n.max(1)).min(spectrum.len() - 1);
            let v = (spectrum[src] as f64).clamp(0.0, 1.0);
            *b = b.max(v);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Dispatch
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub enum MapKind {
    Ripple(Ripple),
    Columns(Columns),
    Spiral(Spiral),
    Checkers(Checkers),
    Swirl(Swirl),
    Mask(Mask),
    Lissajous(Lissajous),
    Bubbles(Bubbles),
    Dimples(Dimples),
    Pumping(Pumping),
    Scribbles(Scribbles),
    Maze(Maze),
    Mountain(Mountain),
    Sharks(Sharks),
    Castle(Castle),
    Clock(Clock),
    Equalizer(Equalizer),
}

impl MapKind {
    fn inner(&self) -> &dyn HeightMap {
        match self {
            MapKind::Ripple(m) => m,
            MapKind::Columns(m) => m,
            MapKind::Spiral(m) => m,
            MapKind::Checkers(m) => m,
            MapKind::Swirl(m) => m,
            MapKind::Mask(m) => m,
            MapKind::Lissajous(m) => m,
            MapKind::Bubbles(m) => m,
            MapKind::Dimples(m) => m,
            MapKind::Pumping(m) => m,
            MapKind::Scribbles(m) => m,
            MapKind::Maze(m) => m,
            MapKind::Mountain(m) => m,
            MapKind::Sharks(m) => m,
            MapKind::Castle(m) => m,
            MapKind::Clock(m) => m,
            MapKind::Equalizer(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn HeightMap {
        match self {
            MapKind::Ripple(m) => m,
            MapKind::Columns(m) => m,
            MapKind::Spiral(m) => m,
            MapKind::Checkers(m) => m,
            MapKind::Swirl(m) => m,
            MapKind::Mask(m) => m,
            MapKind::Lissajous(m) => m,
            MapKind::Bubbles(m) => m,
            MapKind::Dimples(m) => m,
            MapKind::Pumping(m) => m,
            MapKind::Scribbles(m) => m,
            MapKind::Maze(m) => m,
            MapKind::Mountain(m) => m,
            MapKind::Sharks(m) => m,
            MapKind::Castle(m) => m,
            MapKind::Clock(m) => m,
            MapKind::Equalizer(m) => m,
        }
    }
}

impl HeightMap for MapKind {
    fn height(&self, field: &HeightField, i: usize, j: usize, t: f64) -> f64 {
        let h = self.inner().height(field, i, j, t);
        if h.is_finite() { h } else { 1.0 }
    }

    fn on_start(&mut self, ctx: &mut MapCtx) {
        self.inner_mut().on_start(ctx)
    }

    fn update(&mut self, ctx: &mut MapCtx) {
        self.inner_mut().update(ctx)
    }

    fn on_action(&mut self, field: &mut HeightField, at: (usize, usize)) {
        self.inner_mut().on_action(field, at)
    }

    fn blocks(&self, i: usize, j: usize) -> bool {
        self.inner().blocks(i, j)
    }
}
