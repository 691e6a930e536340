//! Engine adapter that drives the `lesshint` executable.
//!
//! The buffer under validation lives only in editor memory, so each check
//! writes it to a scratch directory together with the resolved config and
//! runs the CLI with its JSON reporter.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use super::{LintEngine, NativeFinding};

const ENGINE_NAME: &str = "lesshint";
const RC_FILE_NAME: &str = ".lesshintrc";

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// `LintEngine` backed by the lesshint command-line tool.
pub struct LesshintCli {
    program: PathBuf,
}

impl LesshintCli {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl LintEngine for LesshintCli {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn config_file_name(&self) -> &str {
        RC_FILE_NAME
    }

    fn resolve_config(&self, root: &Path) -> Result<Value> {
        let rc_path = root.join(RC_FILE_NAME);
        if !rc_path.exists() {
            // No rc file: the engine's built-in defaults apply.
            return Ok(Value::Object(Default::default()));
        }

        let raw = fs::read_to_string(&rc_path)
            .with_context(|| format!("Failed to read {}", rc_path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in {}", rc_path.display()))
    }

    fn check(&self, text: &str, path: Option<&Path>, config: &Value) -> Result<Vec<NativeFinding>> {
        let scratch = ScratchDir::create()?;

        // Keep the original filename where possible; some rules report it.
        let file_name = path
            .and_then(|p| p.file_name())
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "buffer.less".into());
        let buffer_path = scratch.path.join(file_name);
        fs::write(&buffer_path, text)
            .with_context(|| format!("Failed to write {}", buffer_path.display()))?;

        let rc_path = scratch.path.join(RC_FILE_NAME);
        fs::write(&rc_path, serde_json::to_string(config)?)
            .with_context(|| format!("Failed to write {}", rc_path.display()))?;

        let output = Command::new(&self.program)
            .arg("--reporter")
            .arg("json")
            .arg("--config")
            .arg(&rc_path)
            .arg(&buffer_path)
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        // lesshint exits non-zero whenever it reports findings, so the exit
        // status alone does not signal failure; an unparseable report does.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = stdout.trim();
        if report.is_empty() {
            if output.status.success() {
                return Ok(Vec::new());
            }
            bail!(
                "{} exited with {} and produced no report: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        serde_json::from_str(report)
            .with_context(|| format!("Unparseable report from {}", self.program.display()))
    }
}

/// Short-lived working directory under the system temp dir, removed on drop.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create() -> Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "lesshint-ls-{}-{}",
            std::process::id(),
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create scratch dir {}", path.display()))?;
        Ok(Self { path })
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
