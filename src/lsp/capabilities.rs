//! Negotiation of optional client capabilities.

use tower_lsp::lsp_types::ClientCapabilities;

/// Optional protocol features the connected client declared at initialize.
///
/// Recorded once, never renegotiated. When a flag is off the server falls
/// back to static behavior (static settings snapshot, local file watching).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    /// Client supports `workspace/didChangeConfiguration` registration
    pub configuration: bool,
    /// Client supports workspace-folder change notifications
    pub workspace_folders: bool,
    /// Client supports dynamic `workspace/didChangeWatchedFiles` watchers
    pub watched_files: bool,
}

impl CapabilityFlags {
    pub fn from_client(capabilities: &ClientCapabilities) -> Self {
        let workspace = capabilities.workspace.as_ref();
        Self {
            configuration: workspace
                .and_then(|w| w.configuration)
                .unwrap_or(false),
            workspace_folders: workspace
                .and_then(|w| w.workspace_folders)
                .unwrap_or(false),
            watched_files: workspace
                .and_then(|w| w.did_change_watched_files.as_ref())
                .and_then(|w| w.dynamic_registration)
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{
        DidChangeWatchedFilesClientCapabilities, WorkspaceClientCapabilities,
    };

    #[test]
    fn empty_capabilities_negotiate_to_all_off() {
        let flags = CapabilityFlags::from_client(&ClientCapabilities::default());
        assert_eq!(flags, CapabilityFlags::default());
    }

    #[test]
    fn declared_capabilities_are_recorded() {
        let capabilities = ClientCapabilities {
            workspace: Some(WorkspaceClientCapabilities {
                configuration: Some(true),
                workspace_folders: Some(true),
                did_change_watched_files: Some(DidChangeWatchedFilesClientCapabilities {
                    dynamic_registration: Some(true),
                    relative_pattern_support: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let flags = CapabilityFlags::from_client(&capabilities);
        assert!(flags.configuration);
        assert!(flags.workspace_folders);
        assert!(flags.watched_files);
    }

    #[test]
    fn watcher_support_requires_dynamic_registration() {
        let capabilities = ClientCapabilities {
            workspace: Some(WorkspaceClientCapabilities {
                did_change_watched_files: Some(DidChangeWatchedFilesClientCapabilities {
                    dynamic_registration: Some(false),
                    relative_pattern_support: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(!CapabilityFlags::from_client(&capabilities).watched_files);
    }
}
