//! Lesshint Language Server
//!
//! A Language Server Protocol implementation that validates documents with
//! the lesshint style checker and publishes the results as diagnostics.
//!
//! This library provides:
//! - Translation of engine findings into LSP diagnostics
//! - Tracked-document state and the validation pipeline
//! - Configuration caching with coarse invalidation
//! - LSP protocol implementation

pub mod cache;
pub mod config;
pub mod controller;
pub mod engine;
pub mod lsp;
pub mod translate;

// Re-exports for clean public API
pub use cache::{ConfigCache, ResolutionRoot};
pub use config::{ClientSettings, Config};
pub use controller::{Controller, TrackedDocument, ValidationOutcome, ValidationPass};
pub use engine::{LintEngine, NativeFinding};
pub use translate::convert_diagnostics;
