/// Procedural maze mask.
///
/// Cells are one of three classes:
///   - `Wall`: impassable, high price
///   - `Path`: carved corridor
///   - `Endpoint`: the fixed start and goal cells
///
/// Carving is an iterative recursive-backtracker over odd coordinates, so
/// every odd cell is reached and the mask is a spanning tree: start and goal
/// are always connected. `reachable()` flood-fills to prove it.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MazeCell {
    Wall,
    Path,
    Endpoint,
}

impl MazeCell {
    pub fn is_open(self) -> bool {
        !matches!(self, MazeCell::Wall)
    }
}

#[derive(Clone, Debug)]
pub struct MazeMask {
    pub width: usize,
    pub height: usize,
    cells: Vec<MazeCell>,
    pub start: (usize, usize),
    pub goal: (usize, usize),
}

const STEPS: [(i64, i64); 4] = [(2, 0), (-2, 0), (0, 2), (0, -2)];

impl MazeMask {
    /// Carve a maze. Even sizes are shrunk to the next odd size so the outer
    /// ring stays solid; anything below 3 becomes 3.
    pub fn generate<R: Rng>(width: usize, height: usize, rng: &mut R) -> Self {
        let width = odd_at_least_3(width);
        let height = odd_at_least_3(height);
        let mut cells = vec![MazeCell::Wall; width * height];
        let start = (1, 1);
        let goal = (width - 2, height - 2);

        cells[start.1 * width + start.0] = MazeCell::Path;
        let mut stack = vec![start];
        while let Some(&(ci, cj)) = stack.last() {
            let mut options: Vec<(usize, usize, usize, usize)> = STEPS.iter()
                .filter_map(|&(di, dj)| {
                    let ni = ci as i64 + di;
                    let nj = cj as i64 + dj;
                    if ni <= 0 || nj <= 0 || ni >= width as i64 - 1 || nj >= height as i64 - 1 {
                        return None;
                    }
                    let (ni, nj) = (ni as usize, nj as usize);
                    if cells[nj * width + ni] != MazeCell::Wall {
                        return None;
                    }
                    let wi = (ci + ni) / 2;
                    let wj = (cj + nj) / 2;
                    Some((ni, nj, wi, wj))
                })
                .collect();

            if options.is_empty() {
                stack.pop();
                continue;
            }
            options.shuffle(rng);
            let (ni, nj, wi, wj) = options[0];
            cells[wj * width + wi] = MazeCell::Path;
            cells[nj * width + ni] = MazeCell::Path;
            stack.push((ni, nj));
        }

        cells[start.1 * width + start.0] = MazeCell::Endpoint;
        cells[goal.1 * width + goal.0] = MazeCell::Endpoint;

        MazeMask { width, height, cells, start, goal }
    }

    /// Cell class; out of range counts as wall.
    pub fn at(&self, i: usize, j: usize) -> MazeCell {
        if i < self.width && j < self.height {
            self.cells[j * self.width + i]
        } else {
            MazeCell::Wall
        }
    }

    /// 4-connected flood fill over open cells from `from`.
    pub fn reachable(&self, from: (usize, usize), to: (usize, usize)) -> bool {
        if !self.at(from.0, from.1).is_open() || !self.at(to.0, to.1).is_open() {
            return false;
        }
        let mut seen = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        seen[from.1 * self.width + from.0] = true;
        queue.push_back(from);

        while let Some((i, j)) = queue.pop_front() {
            if (i, j) == to {
                return true;
            }
            for (di, dj) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                let ni = i as i64 + di;
                let nj = j as i64 + dj;
                if ni < 0 || nj < 0 { continue; }
                let (ni, nj) = (ni as usize, nj as usize);
                if ni >= self.width || nj >= self.height { continue; }
                let k = nj * self.width + ni;
                if !seen[k] && self.cells[k].is_open() {
                    seen[k] = true;
                    queue.push_back((ni, nj));
                }
            }
        }
        false
    }
}

fn odd_at_least_3(n: usize) -> usize {
    let n = n.max(3);
    if n % 2 == 0 { n - 1 } else { n }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn start_always_reaches_goal() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let m = MazeMask::generate(21, 21, &mut rng);
            assert!(m.reachable(m.start, m.goal), "seed {seed}");
        }
    }

    #[test]
    fn odd_sizes_of_every_shape_connect() {
        let mut rng = StdRng::seed_from_u64(3);
        for &(w, h) in &[(3, 3), (5, 11), (15, 7), (20, 20), (2, 1)] {
            let m = MazeMask::generate(w, h, &mut rng);
            assert_eq!(m.width % 2, 1);
            assert_eq!(m.height % 2, 1);
            assert!(m.reachable(m.start, m.goal), "{w}x{h}");
        }
    }

    #[test]
    fn border_is_solid_and_endpoints_marked() {
        let mut rng = StdRng::seed_from_u64(11);
        let m = MazeMask::generate(11, 9, &mut rng);
        for i in 0..m.width {
            assert_eq!(m.at(i, 0), MazeCell::Wall);
            assert_eq!(m.at(i, m.height - 1), MazeCell::Wall);
        }
        for j in 0..m.height {
            assert_eq!(m.at(0, j), MazeCell::Wall);
            assert_eq!(m.at(m.width - 1, j), MazeCell::Wall);
        }
        assert_eq!(m.at(1, 1), MazeCell::Endpoint);
        assert_eq!(m.at(9, 7), MazeCell::Endpoint);
    }

    #[test]
    fn every_odd_cell_is_carved() {
        let mut rng = StdRng::seed_from_u64(5);
        let m = MazeMask::generate(13, 13, &mut rng);
        for j in (1..m.height).step_by(2) {
            for i in (1..m.width).step_by(2) {
                assert!(m.at(i, j).is_open(), "({i},{j})");
            }
        }
    }

    #[test]
    fn walls_block_flood_fill() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = MazeMask::generate(9, 9, &mut rng);
        assert!(!m.reachable(m.start, (0, 0)));
    }
}
