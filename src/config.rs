//! Configuration management for the lesshint language server.
//!
//! Handles:
//! - Command-line argument parsing
//! - Client settings pushed over `workspace/didChangeConfiguration`

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

/// Command-line arguments for the lesshint language server
#[derive(Debug, Parser)]
#[command(name = "lesshint-language-server")]
#[command(about = "Language server for lesshint")]
#[command(version)]
pub struct Args {
    /// Path to the lesshint executable
    #[arg(long, help = "Path to the lesshint executable (defaults to `lesshint` on PATH)")]
    pub lesshint_path: Option<PathBuf>,

    /// Log level for the language server
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    /// Executable used to run checks
    pub lesshint_path: PathBuf,
    /// Log level
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        Ok(Config {
            lesshint_path: args
                .lesshint_path
                .unwrap_or_else(|| PathBuf::from("lesshint")),
            log_level: args.log_level,
        })
    }
}

/// Settings pushed by the client, scoped under the `lesshint` section.
///
/// Absent fields fall back to per-document-directory config resolution.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Resolve configuration from a single global directory instead of the
    /// directory containing each document
    pub global_config: bool,
    /// Directory holding the global rc file
    pub global_config_dir: Option<PathBuf>,
}

impl ClientSettings {
    /// Extract settings from a `workspace/didChangeConfiguration` payload.
    ///
    /// The payload carries every section the client chose to synchronize;
    /// anything malformed or missing yields the defaults.
    pub fn from_notification(settings: &serde_json::Value) -> Self {
        settings
            .get("lesshint")
            .and_then(|section| serde_json::from_value(section.clone()).ok())
            .unwrap_or_default()
    }

    /// Directory used for global config resolution.
    pub fn global_dir(&self) -> PathBuf {
        self.global_config_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("lesshint"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}
