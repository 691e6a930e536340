//! Cache for resolved engine configuration.
//!
//! Each resolution root is either Unloaded (no entry) or Loaded. Validation
//! reads through the cache; configuration-change and watched-file events
//! invalidate the whole cache because a single rc-file change cannot be
//! cheaply mapped to the documents it affects.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use serde_json::Value;

/// Directory (or global marker) used to locate applicable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionRoot {
    /// The client-configured global config directory
    Global,
    /// The directory containing the document being validated
    Directory(PathBuf),
}

/// Last-resolved engine configuration, keyed by resolution root.
#[derive(Debug, Default)]
pub struct ConfigCache {
    slots: HashMap<ResolutionRoot, Value>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-through lookup. A Loaded entry is reused until invalidated; on a
    /// miss the resolver runs and its result is stored. A failed resolution
    /// leaves the slot Unloaded and propagates the error.
    pub fn get_or_resolve<F>(&mut self, root: &ResolutionRoot, resolve: F) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        if let Some(config) = self.slots.get(root) {
            return Ok(config.clone());
        }

        let config = resolve()?;
        self.slots.insert(root.clone(), config.clone());
        Ok(config)
    }

    /// Drop every cached entry. The next validation per root re-resolves.
    pub fn invalidate_all(&mut self) {
        self.slots.clear();
    }

    pub fn is_loaded(&self, root: &ResolutionRoot) -> bool {
        self.slots.contains_key(root)
    }
}
