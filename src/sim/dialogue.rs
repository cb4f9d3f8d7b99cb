/// Scripted dialogue scenes.
///
/// A scene is a static slice of `Line`s. Starting a scene shows its first
/// line at once; each `advance()` shows the next; the advance past the last
/// line ends the scene and hands back its completion value exactly once.
/// An empty scene ends on the very start call.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Line {
    pub side: Side,
    pub portrait: Option<&'static str>,
    pub text: &'static str,
}

#[derive(Debug, PartialEq)]
pub enum Advance<C> {
    Line(Line),
    Finished(C),
    /// No scene is running.
    Idle,
}

#[derive(Debug)]
struct Active<C> {
    id: &'static str,
    lines: &'static [Line],
    index: usize,
    on_complete: C,
}

#[derive(Debug)]
pub struct Dialogue<C> {
    active: Option<Active<C>>,
}

impl<C> Default for Dialogue<C> {
    fn default() -> Self {
        Dialogue { active: None }
    }
}

impl<C> Dialogue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any running scene and show the first line.
    pub fn start(&mut self, id: &'static str, lines: &'static [Line], on_complete: C) -> Advance<C> {
        log::debug!("dialogue: start {id} ({} lines)", lines.len());
        self.active = Some(Active { id, lines, index: 0, on_complete });
        self.show()
    }

    pub fn advance(&mut self) -> Advance<C> {
        match &mut self.active {
            Some(a) => a.index += 1,
            None => return Advance::Idle,
        }
        self.show()
    }

    fn show(&mut self) -> Advance<C> {
        let Some(a) = &self.active else { return Advance::Idle };
        if let Some(line) = a.lines.get(a.index) {
            return Advance::Line(*line);
        }
        match self.active.take() {
            Some(a) => {
                log::debug!("dialogue: {} finished", a.id);
                Advance::Finished(a.on_complete)
            }
            None => Advance::Idle,
        }
    }

    pub fn is_talking(&self) -> bool {
        self.active.is_some()
    }

    pub fn current(&self) -> Option<Line> {
        self.active.as_ref().and_then(|a| a.lines.get(a.index).copied())
    }

    #[cfg(test)]
    pub fn scene_id(&self) -> Option<&'static str> {
        self.active.as_ref().map(|a| a.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE: [Line; 3] = [
        Line { side: Side::Left, portrait: Some("broker"), text: "one" },
        Line { side: Side::Right, portrait: None, text: "two" },
        Line { side: Side::Left, portrait: Some("broker"), text: "three" },
    ];

    #[test]
    fn n_lines_finish_on_the_nth_advance() {
        let mut d = Dialogue::new();
        assert_eq!(d.start("s", &THREE, 7), Advance::Line(THREE[0]));
        assert!(d.is_talking());
        assert_eq!(d.advance(), Advance::Line(THREE[1]));
        assert_eq!(d.advance(), Advance::Line(THREE[2]));
        assert!(d.is_talking());
        assert_eq!(d.advance(), Advance::Finished(7));
        assert!(!d.is_talking());
        assert_eq!(d.advance(), Advance::Idle);
    }

    #[test]
    fn empty_scene_completes_on_start() {
        let mut d: Dialogue<&str> = Dialogue::new();
        assert_eq!(d.start("empty", &[], "done"), Advance::Finished("done"));
        assert!(!d.is_talking());
    }

    #[test]
    fn restart_replaces_running_scene() {
        let mut d = Dialogue::new();
        d.start("a", &THREE, 1);
        d.advance();
        d.start("b", &THREE, 2);
        assert_eq!(d.scene_id(), Some("b"));
        assert_eq!(d.current(), Some(THREE[0]));
        d.advance();
        d.advance();
        assert_eq!(d.advance(), Advance::Finished(2));
    }

    #[test]
    fn idle_advance_is_harmless() {
        let mut d: Dialogue<()> = Dialogue::new();
        assert_eq!(d.advance(), Advance::Idle);
        assert_eq!(d.current(), None);
    }
}
