/// Error types for the few fallible edges of the game:
/// the options file and the static level graph.

use thiserror::Error;

/// Failure reading or writing the persisted options blob.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("options file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed option on line {line}: {text:?}")]
    Malformed { line: usize, text: String },
}

/// A level graph that references something the catalog does not contain.
///
/// Checked once at startup; the graph is static, so any of these is a build
/// mistake rather than a runtime condition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("level catalog is empty")]
    EmptyCatalog,
    #[error("level `{0}` is defined twice")]
    DuplicateLevel(String),
    #[error("level `{from}` transitions to unknown level `{to}`")]
    UnknownLevel { from: String, to: String },
    #[error("level `{level}` references unknown scene `{scene}`")]
    UnknownScene { level: String, scene: String },
}
