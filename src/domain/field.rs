/// HeightField: a damped wave/diffusion solver over a W×H grid.
///
/// Two layers, both row-major `width * height`:
///   - `value`: displacement, what field-backed maps add to their base height
///   - `velocity`: rate of change
///
/// ## Step (one call = one fixed step, whatever the frame dt was)
///
///   1. `L = v(i-1,j) + v(i+1,j) + v(i,j-1) + v(i,j+1) - 4·v(i,j)`, edges clamped
///   2. `velocity += k1 · L · step`, then `velocity *= damping^step`
///   3. `value += k2 · velocity · step`
///   4. subtract the global mean of `value` (zero-mean renormalization)
///
/// Drivers inject pumps, sinks or player weight by writing `velocity` / `value`
/// at single cells before calling `step`. Those setters and `step` are the only
/// write paths.

use crate::config::FieldConfig;

#[derive(Clone, Debug)]
pub struct HeightField {
    width: usize,
    height: usize,
    value: Vec<f64>,
    velocity: Vec<f64>,
    laplacian: Vec<f64>, // scratch, reused every step
    cfg: FieldConfig,
}

impl HeightField {
    /// Zeroed field. A 0×N grid is bumped to 1×1 so every query has a cell to clamp to.
    pub fn new(width: usize, height: usize, cfg: FieldConfig) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let n = width * height;
        HeightField {
            width,
            height,
            value: vec![0.0; n],
            velocity: vec![0.0; n],
            laplacian: vec![0.0; n],
            cfg,
        }
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }

    #[inline]
    fn idx(&self, i: i64, j: i64) -> usize {
        let i = i.clamp(0, self.width as i64 - 1) as usize;
        let j = j.clamp(0, self.height as i64 - 1) as usize;
        j * self.width + i
    }

    /// Displacement at (i, j); out-of-range indices read the nearest edge cell.
    #[inline]
    pub fn get(&self, i: i64, j: i64) -> f64 {
        self.value[self.idx(i, j)]
    }

    #[inline]
    pub fn velocity(&self, i: i64, j: i64) -> f64 {
        self.velocity[self.idx(i, j)]
    }

    /// Overwrite displacement at a cell. Out-of-range writes land on the edge.
    pub fn set_value(&mut self, i: i64, j: i64, v: f64) {
        let k = self.idx(i, j);
        self.value[k] = v;
    }

    /// Overwrite velocity at a cell (pumps, sinks, weight).
    pub fn set_velocity(&mut self, i: i64, j: i64, v: f64) {
        let k = self.idx(i, j);
        self.velocity[k] = v;
    }

    /// Row-major displacement grid, for field-driven visual effects.
    pub fn values(&self) -> &[f64] {
        &self.value
    }

    /// Advance one fixed step.
    pub fn step(&mut self) {
        let step = self.cfg.fixed_step;
        let (w, h) = (self.width as i64, self.height as i64);

        for j in 0..h {
            for i in 0..w {
                let here = self.get(i, j);
                self.laplacian[(j * w + i) as usize] = self.get(i - 1, j)
                    + self.get(i + 1, j)
                    + self.get(i, j - 1)
                    + self.get(i, j + 1)
                    - 4.0 * here;
            }
        }

        let damp = self.cfg.damping.powf(step);
        let mut sum = 0.0;
        for k in 0..self.value.len() {
            self.velocity[k] += self.cfg.k1 * self.laplacian[k] * step;
            self.velocity[k] *= damp;
            self.value[k] += self.cfg.k2 * self.velocity[k] * step;
            sum += self.value[k];
        }

        let mean = sum / self.value.len() as f64;
        for v in &mut self.value {
            *v -= mean;
        }
    }

    /// Sum of squared displacement over cell count.
    #[cfg(test)]
    pub fn mean_square(&self) -> f64 {
        self.value.iter().map(|v| v * v).sum::<f64>() / self.value.len() as f64
    }

    /// Sum of squared displacement and squared velocity, per cell.
    #[cfg(test)]
    pub fn energy(&self) -> f64 {
        let n = self.value.len() as f64;
        self.value.iter().zip(&self.velocity)
            .map(|(v, u)| v * v + u * u)
            .sum::<f64>() / n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(w: usize, h: usize) -> HeightField {
        HeightField::new(w, h, FieldConfig::default())
    }

    #[test]
    fn out_of_range_reads_clamp_to_edge() {
        let mut f = field(3, 2);
        f.set_value(2, 1, 4.0);
        assert_eq!(f.get(99, 99), 4.0);
        assert_eq!(f.get(3, 1), 4.0);
        assert_eq!(f.get(-5, -5), 0.0);
    }

    #[test]
    fn zero_mean_after_every_step() {
        let mut f = field(12, 9);
        f.set_value(3, 4, 2.0);
        f.set_value(8, 1, -0.5);
        f.set_velocity(5, 5, 1.5);
        for _ in 0..50 {
            f.step();
            let sum: f64 = f.values().iter().sum();
            assert!(sum.abs() < 1e-9, "sum drifted to {sum}");
        }
    }

    #[test]
    fn energy_dissipates_without_injection() {
        let mut f = field(16, 16);
        f.set_value(8, 8, 3.0);
        f.set_value(2, 12, -2.0);
        for _ in 0..20 { f.step(); } // transient
        let early = f.energy();
        for _ in 0..3000 { f.step(); }
        let late = f.energy();
        assert!(late < early * 0.5, "energy {early} -> {late}");
        assert!(f.mean_square() < 0.05);
    }

    #[test]
    fn step_is_finite_from_extreme_injection() {
        let mut f = field(4, 4);
        f.set_velocity(0, 0, 1e6);
        for _ in 0..100 { f.step(); }
        assert!(f.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn ripple_spreads_to_neighbours() {
        let mut f = field(9, 9);
        f.set_velocity(4, 4, 1.0);
        f.step();
        assert!(f.get(4, 4) > 0.0);
        f.step();
        // after two steps the neighbour has been pulled up relative to far corners
        assert!(f.get(5, 4) > f.get(0, 0));
    }

    #[test]
    fn degenerate_size_still_has_a_cell() {
        let mut f = field(0, 0);
        f.set_value(0, 0, 1.0);
        f.step();
        assert_eq!(f.width(), 1);
        assert!(f.get(0, 0).abs() < 1e-12); // single cell minus its own mean
    }
}
