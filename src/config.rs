/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub field: FieldConfig,
    pub trade: TradeConfig,
    pub gamepad: GamepadConfig,
    pub seed: Option<u64>,
    pub log_file: PathBuf,
    pub players: usize,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub frame_ms: u64,
    pub move_interval_ms: f64,  // one discrete step (and one trade) per interval
    pub win_delay_ms: f64,      // exit move → on_end
    pub flash_ms: f64,          // visual flash before a level swap lands
    pub party_duration_ms: f64,
}

/// Diffusion solver constants. See `domain::field`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldConfig {
    pub k1: f64,
    pub k2: f64,
    pub damping: f64,
    pub fixed_step: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TradeConfig {
    pub floor_min: f64,
    pub effect_scale: f64,
    pub effect_cap: f64,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub action: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    field: TomlField,
    #[serde(default)]
    trade: TomlTrade,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_frame")]
    frame_ms: u64,
    #[serde(default = "default_move_interval")]
    move_interval_ms: f64,
    #[serde(default = "default_win_delay")]
    win_delay_ms: f64,
    #[serde(default = "default_flash")]
    flash_ms: f64,
    #[serde(default = "default_party_duration")]
    party_duration_ms: f64,
}

#[derive(Deserialize, Debug)]
struct TomlField {
    #[serde(default = "default_k1")]
    k1: f64,
    #[serde(default = "default_k2")]
    k2: f64,
    #[serde(default = "default_damping")]
    damping: f64,
    #[serde(default = "default_fixed_step")]
    fixed_step: f64,
}

#[derive(Deserialize, Debug)]
struct TomlTrade {
    #[serde(default = "default_floor_min")]
    floor_min: f64,
    #[serde(default = "default_effect_scale")]
    effect_scale: f64,
    #[serde(default = "default_effect_cap")]
    effect_cap: f64,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_action")]
    action: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default = "default_players")]
    players: usize,
}

// ── Defaults ──

fn default_frame() -> u64 { 16 }
fn default_move_interval() -> f64 { 150.0 }
fn default_win_delay() -> f64 { 1000.0 }
fn default_flash() -> f64 { 250.0 }
fn default_party_duration() -> f64 { 60_000.0 }

fn default_k1() -> f64 { 0.015 }
fn default_k2() -> f64 { 0.005 }
fn default_damping() -> f64 { 0.999 }
fn default_fixed_step() -> f64 { 20.0 }  // ignores frame dt on purpose

fn default_floor_min() -> f64 { 10.0 }
fn default_effect_scale() -> f64 { 5.0 }
fn default_effect_cap() -> f64 { 5.0 }

fn default_action() -> Vec<String> { vec!["A".into(), "X".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_log_file() -> String { "hft.log".into() }
fn default_players() -> usize { 2 }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            frame_ms: default_frame(),
            move_interval_ms: default_move_interval(),
            win_delay_ms: default_win_delay(),
            flash_ms: default_flash(),
            party_duration_ms: default_party_duration(),
        }
    }
}

impl Default for TomlField {
    fn default() -> Self {
        TomlField {
            k1: default_k1(),
            k2: default_k2(),
            damping: default_damping(),
            fixed_step: default_fixed_step(),
        }
    }
}

impl Default for TomlTrade {
    fn default() -> Self {
        TomlTrade {
            floor_min: default_floor_min(),
            effect_scale: default_effect_scale(),
            effect_cap: default_effect_cap(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            action: default_action(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            seed: None,
            log_file: default_log_file(),
            players: default_players(),
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        TomlField::default().into()
    }
}

impl Default for TradeConfig {
    fn default() -> Self {
        TomlTrade::default().into()
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

impl From<TomlField> for FieldConfig {
    fn from(f: TomlField) -> Self {
        FieldConfig { k1: f.k1, k2: f.k2, damping: f.damping, fixed_step: f.fixed_step }
    }
}

impl From<TomlTrade> for TradeConfig {
    fn from(t: TomlTrade) -> Self {
        TradeConfig { floor_min: t.floor_min, effect_scale: t.effect_scale, effect_cap: t.effect_cap }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse a config document directly (no filesystem search).
    #[cfg(test)]
    pub fn parse_str(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(cfg, &[]))
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        // Relative log paths land next to the first candidate dir
        let log_file = PathBuf::from(&toml_cfg.general.log_file);
        let log_file = if log_file.is_absolute() {
            log_file
        } else {
            search_dirs.first()
                .map(|d| d.join(&log_file))
                .unwrap_or(log_file)
        };

        GameConfig {
            speed: SpeedConfig {
                frame_ms: toml_cfg.speed.frame_ms.max(1),
                move_interval_ms: toml_cfg.speed.move_interval_ms,
                win_delay_ms: toml_cfg.speed.win_delay_ms,
                flash_ms: toml_cfg.speed.flash_ms,
                party_duration_ms: toml_cfg.speed.party_duration_ms,
            },
            field: toml_cfg.field.into(),
            trade: toml_cfg.trade.into(),
            gamepad: GamepadConfig {
                action: toml_cfg.gamepad.action,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
            },
            seed: toml_cfg.general.seed,
            log_file,
            players: toml_cfg.general.players.clamp(1, 4),
        }
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/hft)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/hft");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/hft)
    let sys = PathBuf::from("/usr/share/hft");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        log::warn!("config.toml parse error: {e}; using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    log::warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = GameConfig::parse_str("").unwrap();
        assert_eq!(cfg.speed.move_interval_ms, 150.0);
        assert_eq!(cfg.field.fixed_step, 20.0);
        assert_eq!(cfg.field.damping, 0.999);
        assert_eq!(cfg.trade.floor_min, 10.0);
        assert_eq!(cfg.players, 2);
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = GameConfig::parse_str(
            "[field]\nk1 = 0.02\n\n[general]\nseed = 7\nplayers = 9\n",
        ).unwrap();
        assert_eq!(cfg.field.k1, 0.02);
        assert_eq!(cfg.field.k2, 0.005);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.players, 4); // clamped
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(GameConfig::parse_str("[speed]\nframe_ms = \"fast\"").is_err());
    }
}
