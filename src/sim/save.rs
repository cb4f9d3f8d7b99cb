/// Persisted options: one small key=value blob.
///
/// ## File format:
///   sound=1
///   bloom=0
///   last_level=maze
///
/// Blank lines and `#` comments are skipped, unknown keys are ignored so
/// older binaries can read newer files. A line without `=` is an error.

use std::path::{Path, PathBuf};

use crate::error::SaveError;

const OPTIONS_FILE: &str = "options.dat";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub sound: bool,
    pub bloom: bool,
    /// Furthest campaign level started; the menu resumes here.
    pub last_level: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options { sound: true, bloom: true, last_level: None }
    }
}

// ══════════════════════════════════════════════════════════════
// Paths
// ══════════════════════════════════════════════════════════════

fn save_dir() -> PathBuf {
    // 1. exe directory, if writable (portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let test_path = parent.join(".write_test_hft");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/hft");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn options_path() -> PathBuf {
    save_dir().join(OPTIONS_FILE)
}

// ══════════════════════════════════════════════════════════════
// Load / store
// ══════════════════════════════════════════════════════════════

/// A missing file is not an error: first run gets defaults.
pub fn load_from(path: &Path) -> Result<Options, SaveError> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Options::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn store_to(path: &Path, opts: &Options) -> Result<(), SaveError> {
    std::fs::write(path, serialize(opts))?;
    Ok(())
}

pub fn load() -> Result<Options, SaveError> {
    load_from(&options_path())
}

pub fn store(opts: &Options) -> Result<(), SaveError> {
    store_to(&options_path(), opts)
}

// ══════════════════════════════════════════════════════════════
// Serialization
// ══════════════════════════════════════════════════════════════

fn serialize(opts: &Options) -> String {
    let mut s = String::new();
    s.push_str(&format!("sound={}\n", opts.sound as u8));
    s.push_str(&format!("bloom={}\n", opts.bloom as u8));
    if let Some(level) = &opts.last_level {
        s.push_str(&format!("last_level={}\n", level));
    }
    s
}

fn parse_flag(v: &str) -> Option<bool> {
    match v {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn parse(text: &str) -> Result<Options, SaveError> {
    let mut opts = Options::default();

    for (n, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') { continue; }

        let malformed = || SaveError::Malformed { line: n + 1, text: raw.to_string() };
        let (key, value) = line.split_once('=').ok_or_else(malformed)?;
        let value = value.trim();

        match key.trim() {
            "sound" => opts.sound = parse_flag(value).ok_or_else(malformed)?,
            "bloom" => opts.bloom = parse_flag(value).ok_or_else(malformed)?,
            "last_level" => {
                opts.last_level = (!value.is_empty()).then(|| value.to_string());
            }
            other => log::debug!("options: ignoring unknown key {other:?}"),
        }
    }
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hand_written_file() {
        let text = "# prefs\nsound=0\n\nbloom = on\nlast_level=maze\nfuture_key=7\n";
        let o = parse(text).unwrap();
        assert!(!o.sound);
        assert!(o.bloom);
        assert_eq!(o.last_level.as_deref(), Some("maze"));
    }

    #[test]
    fn line_without_equals_is_malformed() {
        match parse("sound=1\ngarbage\n") {
            Err(SaveError::Malformed { line, text }) => {
                assert_eq!(line, 2);
                assert_eq!(text, "garbage");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn bad_flag_value_is_malformed() {
        assert!(matches!(parse("bloom=maybe"), Err(SaveError::Malformed { line: 1, .. })));
    }

    #[test]
    fn store_then_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("hft-options-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(OPTIONS_FILE);
        let opts = Options { sound: false, bloom: true, last_level: Some("clock".into()) };
        store_to(&path, &opts).unwrap();
        assert_eq!(load_from(&path).unwrap(), opts);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("hft-definitely-missing/options.dat");
        assert_eq!(load_from(&path).unwrap(), Options::default());
    }
}
