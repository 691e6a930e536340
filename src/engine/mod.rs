//! The lint-engine boundary.
//!
//! The engine is an opaque collaborator: text + path + config in, findings
//! out. Findings are validated into a strict structure here; the engine's
//! own severity vocabulary is kept as a string and mapped later.

pub mod cli;

use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

pub use cli::LesshintCli;

/// A single issue reported by the engine, in its own coordinate and
/// severity vocabulary. `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NativeFinding {
    pub line: u32,
    pub column: u32,
    pub message: String,
    /// Rule identifier, e.g. `spaceBeforeBrace`
    pub linter: String,
    pub severity: String,
}

/// Contract for the lint engine backing a server instance.
///
/// Both operations must be repeatable and side-effect-free with respect to
/// server state. Failures are reported to the user but never kill the
/// server.
pub trait LintEngine: Send + Sync {
    /// Name shown as the diagnostic `source` and in user-facing messages
    fn name(&self) -> &str;

    /// Filename of the engine's rc file, watched at any workspace depth
    fn config_file_name(&self) -> &str;

    /// Locate and parse the configuration applicable under `root`
    fn resolve_config(&self, root: &Path) -> Result<Value>;

    /// Check `text` against `config`. `path` is the document's on-disk
    /// location when it has one; some rules use it for context only.
    fn check(&self, text: &str, path: Option<&Path>, config: &Value) -> Result<Vec<NativeFinding>>;
}
