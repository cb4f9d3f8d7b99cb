/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Each grid cell is two terminal columns. A column's price is drawn as a
/// shade glyph whose color runs cold to hot with height; bloom adds a glow
/// to peaks. Trades leave a short-lived +/- spark on the destination cell.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::sim::catalog::MENU;
use crate::sim::dialogue::{Line, Side};
use crate::sim::event::GameEvent;
use crate::sim::world::{GameState, Phase};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for every "empty" terminal cell, matched by
    /// `Clear` so inter-row gaps share the same color.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel used to invalidate the back buffer.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (k, ch) in s.chars().enumerate() {
            if x + k >= self.width { break; }
            self.set(x + k, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Shading ──

const RAMP: [char; 5] = ['·', '░', '▒', '▓', '█'];
const TOP_PRICE: f64 = 3.0;

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t.clamp(0.0, 1.0)).round() as u8
}

fn rgb(c: (u8, u8, u8)) -> Color {
    Color::Rgb { r: c.0, g: c.1, b: c.2 }
}

fn mix(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    (lerp(a.0, b.0, t), lerp(a.1, b.1, t), lerp(a.2, b.2, t))
}

/// Glyph plus fg/bg for a price. Cold blue at 0, green at 1, amber, then
/// red at `TOP_PRICE` and above.
fn shade(h: f64, bloom: bool) -> (char, (u8, u8, u8), (u8, u8, u8)) {
    let x = if h.is_finite() { (h / TOP_PRICE).clamp(0.0, 1.0) } else { 0.0 };
    let glyph = RAMP[((x * (RAMP.len() - 1) as f64).round() as usize).min(RAMP.len() - 1)];
    let stops = [(40, 70, 200), (60, 200, 120), (240, 200, 60), (240, 70, 60)];
    let seg = x * (stops.len() - 1) as f64;
    let k = (seg.floor() as usize).min(stops.len() - 2);
    let fg = mix(stops[k], stops[k + 1], seg - k as f64);

    let base = (22, 22, 35);
    let bg = if bloom && x > 0.5 {
        mix(base, fg, (x - 0.5) * 0.8)
    } else {
        base
    };
    (glyph, fg, bg)
}

/// Field-driven shimmer: strong displacement pulls the background toward white.
fn ripple_glow(bg: (u8, u8, u8), displacement: f64) -> (u8, u8, u8) {
    let k = if displacement.is_finite() { (displacement.abs() - 0.1).clamp(0.0, 1.0) * 0.35 } else { 0.0 };
    mix(bg, (230, 230, 255), k)
}

/// Greedy word wrap to `width` columns.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines: Vec<String> = vec![];
    let mut cur = String::new();
    for word in text.split_whitespace() {
        let needed = if cur.is_empty() { word.chars().count() } else { cur.chars().count() + 1 + word.chars().count() };
        if needed > width && !cur.is_empty() {
            lines.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() { cur.push(' '); }
        cur.push_str(word);
    }
    if !cur.is_empty() { lines.push(cur); }
    lines
}

fn player_color(p: usize) -> Color {
    match p {
        0 => Color::White,
        1 => Color::Cyan,
        2 => Color::Magenta,
        _ => Color::Yellow,
    }
}

// ── Renderer ──

/// Each grid cell is this many terminal columns wide.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
const SPARK_MS: f64 = 350.0;
const DIALOGUE_ROWS: usize = 5;

/// Front-end state the simulation doesn't own.
pub struct View<'a> {
    pub level_names: &'a [&'static str],
    pub menu_cursor: usize,
    pub bloom: bool,
    pub sound: bool,
    pub gamepad: bool,
}

struct Spark {
    i: usize,
    j: usize,
    effect: f64,
    until: f64,
}

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_level: Option<&'static str>,
    sparks: Vec<Spark>,
    ranking: Vec<(usize, i64)>,
    /// Terminal reports key releases, so held keys need no timeout.
    pub key_release: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_level: None,
            sparks: vec![],
            ranking: vec![],
            key_release: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            self.key_release = execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            ).is_ok();
        }
        log::debug!("key release events: {}", self.key_release);

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // force a full repaint on the first frame
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.key_release {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Remember what this frame's events need drawn later.
    pub fn note_events(&mut self, events: &[GameEvent], now: f64) {
        for e in events {
            match e {
                GameEvent::Trade { i, j, effect, .. } if *effect != 0.0 => {
                    self.sparks.push(Spark { i: *i, j: *j, effect: *effect, until: now + SPARK_MS });
                }
                GameEvent::LevelStarted { .. } => self.sparks.clear(),
                GameEvent::PartyFinished { ranking } => self.ranking = ranking.clone(),
                _ => {}
            }
        }
        self.sparks.retain(|s| s.until > now);
    }

    pub fn render(&mut self, state: &GameState, view: &View) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        let resized = tw as usize != self.term_w || th as usize != self.term_h;
        let level_changed = self.last_level != Some(state.level_id());
        if resized || level_changed {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_level = Some(state.level_id());
        }

        self.front.clear();
        self.compose_hud(state, view);
        self.compose_grid(state, view);
        if state.level_id() == MENU && state.pending.is_none() {
            self.compose_menu(view);
        }
        if let Some(line) = state.dialogue_line() {
            self.compose_dialogue(&line);
        }
        if let Phase::PartyResults { .. } = state.phase {
            self.compose_ranking();
        }
        if let Some(p) = state.flash() {
            self.compose_flash(p);
        }
        self.compose_help(state);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // explicit base colors; ResetColor would fall back to the terminal default
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn grid_origin(&self, state: &GameState) -> usize {
        let (w, _) = state.grid_size();
        // one spare column on the left for the exit marker
        (self.front.width.saturating_sub(w * CELL_W)) / 2
    }

    fn compose_hud(&mut self, state: &GameState, view: &View) {
        let hud_bg = Color::Rgb { r: 30, g: 30, b: 60 };
        self.front.fill_row(HUD_ROW, hud_bg);
        let def = state.def();

        let text = if let Some(left) = state.party_remaining() {
            let mut s = format!(" PARTY {}  {:>3}s ", def.meta.name, (left / 1000.0).ceil() as i64);
            for p in 0..state.players.len() {
                s.push_str(&format!(" P{}:{} ", p + 1, state.capital_of(p)));
            }
            s
        } else {
            let target = def.win_capital
                .map(|t| t.to_string())
                .unwrap_or_else(|| "∞".to_string());
            let stairs = if state.stairs.first().copied().unwrap_or(false) { "  ◄ EXIT OPEN" } else { "" };
            format!(
                " {}  │  capital {} / {}  │  stocks {}  │  bought @ {:.2}{}",
                def.meta.name,
                state.player_capital(),
                target,
                state.players.first().map(|p| p.stocks as i64).unwrap_or(0),
                state.players.first().map(|p| p.buy_price).unwrap_or(0.0),
                stairs,
            )
        };
        self.front.put_str(0, HUD_ROW, &text, Color::White, hud_bg);

        let flags = format!(
            "{}{}{} ",
            if view.gamepad { "◆" } else { " " },
            if view.sound { "♪" } else { " " },
            if view.bloom { "✦" } else { " " },
        );
        let x = self.front.width.saturating_sub(flags.chars().count());
        self.front.put_str(x, HUD_ROW, &flags, Color::Rgb { r: 255, g: 200, b: 50 }, hud_bg);
    }

    fn compose_grid(&mut self, state: &GameState, view: &View) {
        let (w, h) = state.grid_size();
        let ox = self.grid_origin(state);
        let field = state.current_field();

        for j in 0..h {
            let row = MAP_ROW + j;
            for i in 0..w {
                let col = ox + i * CELL_W;
                if state.blocked(i, j) {
                    let wall = Cell::new('█', Color::Rgb { r: 90, g: 90, b: 100 }, Color::Reset);
                    self.front.set(col, row, wall);
                    self.front.set(col + 1, row, wall);
                    continue;
                }
                let (glyph, fg, mut bg) = shade(state.current_height(i, j), view.bloom);
                if view.bloom {
                    let ripple = field.get(j * w + i).copied().unwrap_or(0.0);
                    bg = ripple_glow(bg, ripple);
                }
                let cell = Cell::new(glyph, rgb(fg), rgb(bg));
                self.front.set(col, row, cell);
                self.front.set(col + 1, row, cell);
            }
        }

        for s in &self.sparks {
            let (mark, color) = if s.effect > 0.0 { ('+', Color::Green) } else { ('-', Color::Red) };
            let cell = self.front.get(ox + s.i * CELL_W, MAP_ROW + s.j);
            self.front.set(ox + s.i * CELL_W + 1, MAP_ROW + s.j, Cell::new(mark, color, cell.bg));
        }

        // exit marker left of the spawn row once capital is high enough
        if state.stairs.iter().any(|s| *s) && ox >= 1 {
            let (_, sj) = state.def().spawn();
            self.front.set(ox - 1, MAP_ROW + sj, Cell::new('◄', Color::Yellow, Color::Reset));
        }

        for (p, player) in state.players.iter().enumerate() {
            let col = ox + player.i * CELL_W;
            let row = MAP_ROW + player.j;
            let under = self.front.get(col, row);
            let mark = if state.players.len() > 1 {
                char::from_digit((p + 1) as u32, 10).unwrap_or('@')
            } else {
                '@'
            };
            self.front.set(col, row, Cell::new(mark, player_color(p), under.bg));
        }
    }

    fn compose_menu(&mut self, view: &View) {
        let x = 2;
        let mut y = MAP_ROW;
        let hi = Color::Rgb { r: 80, g: 255, b: 80 };
        let dim = Color::Rgb { r: 140, g: 140, b: 160 };
        let title = Color::Rgb { r: 255, g: 200, b: 50 };

        self.front.put_str(x, y, "H F T", title, Color::Reset);
        y += 1;
        self.front.put_str(x, y, "buy low, sell high", dim, Color::Reset);
        y += 2;
        for (k, name) in view.level_names.iter().enumerate() {
            let (mark, color) = if k == view.menu_cursor { ("▸ ", hi) } else { ("  ", dim) };
            self.front.put_str(x, y, &format!("{mark}{name}"), color, Color::Reset);
            y += 1;
        }
    }

    fn compose_dialogue(&mut self, line: &Line) {
        let width = self.front.width.min(72);
        let x0 = (self.front.width - width) / 2;
        let y0 = self.front.height.saturating_sub(DIALOGUE_ROWS + 1);
        let bg = Color::Rgb { r: 35, g: 35, b: 55 };
        let border = Color::Rgb { r: 255, g: 200, b: 50 };

        for y in y0..y0 + DIALOGUE_ROWS {
            for x in x0..x0 + width {
                self.front.set(x, y, Cell::new(' ', Color::White, bg));
            }
        }
        for x in x0..x0 + width {
            self.front.set(x, y0, Cell::new('─', border, bg));
        }

        if let Some(portrait) = line.portrait {
            let tag = format!("[{portrait}]");
            let tx = match line.side {
                Side::Left => x0 + 2,
                Side::Right => (x0 + width).saturating_sub(tag.chars().count() + 2),
            };
            self.front.put_str(tx, y0, &tag, border, bg);
        }

        let inner = width.saturating_sub(4);
        for (k, text) in wrap(line.text, inner).iter().take(DIALOGUE_ROWS - 2).enumerate() {
            let tx = match line.side {
                Side::Left => x0 + 2,
                Side::Right => (x0 + width).saturating_sub(text.chars().count() + 2),
            };
            self.front.put_str(tx, y0 + 1 + k, text, Color::White, bg);
        }
        self.front.put_str((x0 + width).saturating_sub(10), y0 + DIALOGUE_ROWS - 1, "ENTER ▸", border, bg);
    }

    fn compose_ranking(&mut self) {
        let bg = Color::Rgb { r: 40, g: 40, b: 40 };
        let w = 28.min(self.front.width);
        let x0 = (self.front.width - w) / 2;
        let y0 = MAP_ROW + 2;
        for y in y0..y0 + self.ranking.len() + 3 {
            for x in x0..x0 + w {
                self.front.set(x, y, Cell::new(' ', Color::White, bg));
            }
        }
        self.front.put_str(x0 + 2, y0, "TIME!  final capital", Color::Rgb { r: 255, g: 220, b: 50 }, bg);
        for (k, (p, cap)) in self.ranking.iter().enumerate() {
            let row = format!("{}. P{}  {:>10}", k + 1, p + 1, cap);
            self.front.put_str(x0 + 2, y0 + 2 + k, &row, player_color(*p), bg);
        }
    }

    /// White-out over the whole frame, growing with `p` in [0, 1].
    fn compose_flash(&mut self, p: f64) {
        let white = (240, 240, 255);
        for cell in &mut self.front.cells {
            let base = match cell.bg {
                Color::Rgb { r, g, b } => (r, g, b),
                _ => (22, 22, 35),
            };
            cell.bg = rgb(mix(base, white, p));
        }
    }

    fn compose_help(&mut self, state: &GameState) {
        let y = self.front.height.saturating_sub(1);
        let text = if state.level_id() == MENU {
            " SPACE start/resume  TAB pick level  L jump  P party  M sound  B bloom  Q quit"
        } else if state.is_talking() {
            " ENTER next line"
        } else {
            " ←→↑↓ / WASD trade  SPACE / F pump  ESC menu  M sound  B bloom"
        };
        self.front.put_str(0, y, text, Color::DarkGrey, Color::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shade_runs_cold_to_hot() {
        let (g0, c0, _) = shade(0.0, false);
        let (g1, c1, _) = shade(3.5, false);
        assert_eq!(g0, RAMP[0]);
        assert_eq!(g1, RAMP[RAMP.len() - 1]);
        assert!(c0.2 > c0.0, "low prices are blue");
        assert!(c1.0 > c1.2, "high prices are red");
    }

    #[test]
    fn bloom_only_lifts_peaks() {
        let (_, _, low) = shade(0.5, true);
        let (_, _, high) = shade(2.8, true);
        let (_, _, flat) = shade(2.8, false);
        assert_eq!(low, (22, 22, 35));
        assert_ne!(high, flat);
    }

    #[test]
    fn calm_field_adds_no_glow() {
        assert_eq!(ripple_glow((22, 22, 35), 0.05), (22, 22, 35));
        assert_ne!(ripple_glow((22, 22, 35), 0.8), (22, 22, 35));
        assert_eq!(ripple_glow((22, 22, 35), f64::NAN), (22, 22, 35));
    }

    #[test]
    fn shade_survives_nan() {
        let (g, _, _) = shade(f64::NAN, true);
        assert_eq!(g, RAMP[0]);
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn frame_buffer_clips() {
        let mut fb = FrameBuffer::new(4, 2);
        fb.put_str(2, 0, "abcdef", Color::White, Color::Reset);
        assert_eq!(fb.get(3, 0).ch, 'b');
        assert_eq!(fb.get(9, 9), Cell::BLANK);
    }
}
