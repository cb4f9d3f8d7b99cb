/// The level catalog and its transition graph.
///
/// Each `MapDef` names its grid, capital range, spawn, height map template
/// and a small transition descriptor: an optional scene played on start and
/// an `EndRule` saying where to go (and what to say) once the level is won.
/// `validate()` checks the whole graph once at startup.

use std::collections::HashSet;
use std::f64::consts::PI;

use crate::domain::agents::SharkSwarm;
use crate::error::GraphError;
use crate::sim::maps::{
    Bubbles, Castle, Checkers, Clock, ColumnWave, Columns, Dimples, Equalizer, Lissajous,
    MapKind, Mask, Maze, Mountain, Pumping, Ripple, Scribbles, Sharks, Spiral, Swirl,
};
use crate::sim::scenes;

pub const MENU: &str = "menu";
pub const FIRST_LEVEL: &str = "tutorial";

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CameraHint {
    pub eye: [f32; 3],
    pub look_at: [f32; 3],
}

/// Presentation metadata carried on level events.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct LevelMeta {
    pub name: &'static str,
    pub camera: Option<CameraHint>,
    pub music: Option<&'static str>,
}

/// Sticky flags set by play and read by branching end rules.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Flag {
    TutorialLoss,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Target {
    pub level: &'static str,
    /// Played before the swap; the swap happens when it finishes.
    pub scene: Option<&'static str>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EndRule {
    Goto(Target),
    Branch { flag: Flag, if_set: Target, otherwise: Target },
}

impl EndRule {
    pub fn resolve(&self, flags: &HashSet<Flag>) -> Target {
        match *self {
            EndRule::Goto(t) => t,
            EndRule::Branch { flag, if_set, otherwise } => {
                if flags.contains(&flag) { if_set } else { otherwise }
            }
        }
    }

    fn targets(&self) -> Vec<Target> {
        match *self {
            EndRule::Goto(t) => vec![t],
            EndRule::Branch { if_set, otherwise, .. } => vec![if_set, otherwise],
        }
    }
}

#[derive(Clone, Debug)]
pub struct MapDef {
    pub id: &'static str,
    pub meta: LevelMeta,
    pub size: (usize, usize),
    pub start_capital: i64,
    /// None: the level cannot be won by trading (the menu demo).
    pub win_capital: Option<i64>,
    /// Spawn cell; grid centre when absent.
    pub start: Option<(usize, usize)>,
    /// Template, cloned fresh whenever the level starts.
    pub kind: MapKind,
    pub on_start: Option<&'static str>,
    pub on_end: EndRule,
    /// Set when a trade here shrinks a player's holdings.
    pub loss_flag: Option<Flag>,
}

impl MapDef {
    pub fn spawn(&self) -> (usize, usize) {
        let (w, h) = self.size;
        let (i, j) = self.start.unwrap_or((w / 2, h / 2));
        (i.min(w.saturating_sub(1)), j.min(h.saturating_sub(1)))
    }
}

// ══════════════════════════════════════════════════════════════
// Catalog
// ══════════════════════════════════════════════════════════════

const fn goto(level: &'static str) -> EndRule {
    EndRule::Goto(Target { level, scene: None })
}

const fn meta(name: &'static str, music: &'static str) -> LevelMeta {
    LevelMeta { name, camera: None, music: Some(music) }
}

struct Def {
    id: &'static str,
    meta: LevelMeta,
    size: (usize, usize),
    win: Option<i64>,
    kind: MapKind,
    on_end: EndRule,
}

impl Def {
    fn build(self) -> MapDef {
        MapDef {
            id: self.id,
            meta: self.meta,
            size: self.size,
            start_capital: 1000,
            win_capital: self.win,
            start: None,
            kind: self.kind,
            on_start: None,
            on_end: self.on_end,
            loss_flag: None,
        }
    }
}

fn level(id: &'static str, name: &'static str, size: (usize, usize), win: i64, kind: MapKind, next: &'static str) -> MapDef {
    Def { id, meta: meta(name, "floor"), size, win: Some(win), kind, on_end: goto(next) }.build()
}

pub fn catalog() -> Vec<MapDef> {
    let wave = |phase| ColumnWave { base: 1.0, amp: 0.5, omega: 0.002, phase };

    let mut menu = Def {
        id: MENU,
        meta: LevelMeta {
            name: "HFT",
            camera: Some(CameraHint { eye: [10.0, 80.0, 300.0], look_at: [10.0, 0.0, 10.0] }),
            music: Some("lobby"),
        },
        size: (20, 20),
        win: None,
        kind: MapKind::Ripple(Ripple),
        on_end: goto(FIRST_LEVEL),
    }.build();
    menu.start = Some((10, 10));

    let mut tutorial = Def {
        id: "tutorial",
        meta: meta("Two Columns", "tutorial"),
        size: (2, 1),
        win: Some(2000),
        kind: MapKind::Columns(Columns { columns: vec![ColumnWave::flat(1.0), wave(0.0)] }),
        on_end: EndRule::Branch {
            flag: Flag::TutorialLoss,
            if_set: Target { level: "tutorial2", scene: Some("tutorial_loss") },
            otherwise: Target { level: "spiral", scene: Some("tutorial_win") },
        },
    }.build();
    tutorial.start = Some((0, 0));
    tutorial.on_start = Some("tutorial_intro");
    tutorial.loss_flag = Some(Flag::TutorialLoss);

    let mut tutorial2 = level("tutorial2", "Three Columns", (3, 1), 2000,
        MapKind::Columns(Columns { columns: vec![ColumnWave::flat(1.0), wave(0.0), wave(PI)] }),
        "spiral");
    tutorial2.start = Some((0, 0));

    let mut spiral = level("spiral", "Spiral", (20, 20), 3000,
        MapKind::Spiral(Spiral { w: 20, h: 20 }), "checkers");
    spiral.on_start = Some("spiral_intro");

    let mut pumping = level("pumping", "Pump and Dump", (16, 16), 5000,
        MapKind::Pumping(Pumping), "scribbles");
    pumping.on_start = Some("pumping_intro");

    let mut maze = level("maze", "Labyrinth", (21, 21), 6000,
        MapKind::Maze(Maze::default()), "mountain");
    maze.start = Some((1, 1));
    maze.on_start = Some("maze_intro");

    let mut sharks = level("sharks", "Short Sellers", (20, 20), 8000,
        MapKind::Sharks(Sharks { swarm: SharkSwarm::new(4, 20, 20) }), "castle");
    sharks.on_start = Some("sharks_intro");

    let mut clock = level("clock", "Clock", (15, 8), 8000,
        MapKind::Clock(Clock::default()), "equalizer");
    clock.on_start = Some("clock_intro");

    let mut equalizer = level("equalizer", "Equalizer", (16, 12), 8000,
        MapKind::Equalizer(Equalizer::new(16, 12)), MENU);
    equalizer.on_end = EndRule::Goto(Target { level: MENU, scene: Some("finale") });
    equalizer.meta.music = Some("finale");

    vec![
        menu,
        tutorial,
        tutorial2,
        spiral,
        level("checkers", "Checkers", (16, 16), 3000, MapKind::Checkers(Checkers), "swirl"),
        level("swirl", "Swirl", (20, 20), 4000, MapKind::Swirl(Swirl), "mask"),
        level("mask", "Mask", (16, 16), 4000, MapKind::Mask(Mask), "pumping"),
        pumping,
        level("scribbles", "Scribbles", (20, 20), 5000,
            MapKind::Scribbles(Scribbles::new(20, 20)), "lissajous"),
        level("lissajous", "Lissajous", (20, 20), 5000,
            MapKind::Lissajous(Lissajous { w: 20, h: 20 }), "bubbles"),
        level("bubbles", "Bubbles", (20, 20), 5000,
            MapKind::Bubbles(Bubbles { w: 20, h: 20 }), "dimples"),
        level("dimples", "Dimples", (20, 20), 6000,
            MapKind::Dimples(Dimples { w: 20, h: 20 }), "maze"),
        maze,
        level("mountain", "Mountain", (16, 16), 6000, MapKind::Mountain(Mountain::new()), "sharks"),
        sharks,
        level("castle", "Castle", (20, 20), 8000, MapKind::Castle(Castle::new()), "clock"),
        clock,
        equalizer,
    ]
}

pub fn find(catalog: &[MapDef], id: &str) -> Option<usize> {
    catalog.iter().position(|d| d.id == id)
}

/// Every level id unique, every transition target and scene defined.
pub fn validate(catalog: &[MapDef]) -> Result<(), GraphError> {
    if catalog.is_empty() {
        return Err(GraphError::EmptyCatalog);
    }

    let mut seen = HashSet::new();
    for def in catalog {
        if !seen.insert(def.id) {
            return Err(GraphError::DuplicateLevel(def.id.to_string()));
        }
    }

    let scene_exists = |level: &str, scene: &str| {
        if scenes::scene(scene).is_some() {
            Ok(())
        } else {
            Err(GraphError::UnknownScene { level: level.to_string(), scene: scene.to_string() })
        }
    };

    for def in catalog {
        if let Some(scene) = def.on_start {
            scene_exists(def.id, scene)?;
        }
        for target in def.on_end.targets() {
            if !seen.contains(target.level) {
                return Err(GraphError::UnknownLevel {
                    from: def.id.to_string(),
                    to: target.level.to_string(),
                });
            }
            if let Some(scene) = target.scene {
                scene_exists(def.id, scene)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_catalog_is_valid() {
        assert_eq!(validate(&catalog()), Ok(()));
    }

    #[test]
    fn campaign_order() {
        let cat = catalog();
        let mut id = FIRST_LEVEL;
        let mut path = vec![];
        let flags = HashSet::new();
        while id != MENU && path.len() < 50 {
            path.push(id);
            let def = &cat[find(&cat, id).unwrap()];
            id = def.on_end.resolve(&flags).level;
        }
        assert_eq!(path, [
            "tutorial", "spiral", "checkers", "swirl", "mask", "pumping", "scribbles",
            "lissajous", "bubbles", "dimples", "maze", "mountain", "sharks", "castle",
            "clock", "equalizer",
        ]);
    }

    #[test]
    fn tutorial_branches_on_loss() {
        let cat = catalog();
        let tut = &cat[find(&cat, "tutorial").unwrap()];
        let mut flags = HashSet::new();
        assert_eq!(tut.on_end.resolve(&flags).level, "spiral");
        flags.insert(Flag::TutorialLoss);
        assert_eq!(tut.on_end.resolve(&flags).level, "tutorial2");
    }

    #[test]
    fn dangling_target_is_rejected() {
        let mut cat = catalog();
        cat[2].on_end = goto("atlantis");
        assert_eq!(validate(&cat), Err(GraphError::UnknownLevel {
            from: "tutorial2".into(),
            to: "atlantis".into(),
        }));
    }

    #[test]
    fn unknown_scene_is_rejected() {
        let mut cat = catalog();
        cat[3].on_start = Some("missing");
        assert!(matches!(validate(&cat), Err(GraphError::UnknownScene { .. })));
    }

    #[test]
    fn duplicates_and_empty_rejected() {
        let mut cat = catalog();
        let dup = cat[4].clone();
        cat.push(dup);
        assert_eq!(validate(&cat), Err(GraphError::DuplicateLevel("checkers".into())));
        assert_eq!(validate(&[]), Err(GraphError::EmptyCatalog));
    }

    #[test]
    fn spawns_lie_inside_grids() {
        for def in catalog() {
            let (i, j) = def.spawn();
            assert!(i < def.size.0 && j < def.size.1, "{}", def.id);
        }
    }
}
