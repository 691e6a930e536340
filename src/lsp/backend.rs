//! The LSP backend: forwards editor events into the controller and
//! delivers the resulting validation passes back to the client.

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Mutex};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::config::ClientSettings;
use crate::controller::{Controller, ValidationOutcome, ValidationPass};
use crate::engine::LintEngine;
use crate::lsp::capabilities::CapabilityFlags;

/// Holds the protocol state and the shared controller.
pub struct Backend {
    pub client: Client,
    pub controller: Arc<Mutex<Controller>>,
    capabilities: Mutex<CapabilityFlags>,
    workspace_root: Mutex<Option<PathBuf>>,
}

impl Backend {
    pub fn new(client: Client, engine: Arc<dyn LintEngine>) -> Self {
        Self {
            client,
            controller: Arc::new(Mutex::new(Controller::new(engine))),
            capabilities: Mutex::new(CapabilityFlags::default()),
            workspace_root: Mutex::new(None),
        }
    }

    async fn deliver(&self, pass: ValidationPass) {
        deliver_pass(&self.client, &self.controller, pass).await;
    }

    async fn deliver_all(&self, passes: Vec<ValidationPass>) {
        for pass in passes {
            self.deliver(pass).await;
        }
    }

    async fn register_configuration_notifications(&self) {
        let registration = Registration {
            id: "lesshint-configuration".to_string(),
            method: "workspace/didChangeConfiguration".to_string(),
            register_options: None,
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            self.client
                .log_message(
                    MessageType::WARNING,
                    format!("Failed to register for configuration changes: {e}"),
                )
                .await;
        }
    }

    async fn register_rc_file_watcher(&self, rc_file: &str) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: vec![FileSystemWatcher {
                glob_pattern: GlobPattern::String(format!("**/{rc_file}")),
                kind: Some(WatchKind::Create | WatchKind::Change | WatchKind::Delete),
            }],
        };
        let registration = Registration {
            id: "lesshint-rc-watch".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(options).ok(),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            self.client
                .log_message(
                    MessageType::WARNING,
                    format!("Failed to register rc-file watcher ({e}); config file edits won't trigger re-validation"),
                )
                .await;
        }
    }

    /// Local watcher for clients that cannot watch files themselves: watch
    /// the workspace root recursively and react to the engine's rc file.
    fn start_fallback_watcher(&self, root: PathBuf, rc_file: String) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let watched_name = rc_file.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) && event.paths.iter().any(|path| {
                        path.file_name().and_then(|n| n.to_str()) == Some(watched_name.as_str())
                    });
                    if relevant {
                        let _ = tx.send(());
                    }
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        log::info!(
            "watching {} for {} changes (fallback watcher)",
            root.display(),
            rc_file
        );

        let client = self.client.clone();
        let controller = self.controller.clone();
        tokio::spawn(async move {
            // The watcher stops reporting once dropped; keep it alive for
            // the lifetime of the drain task.
            let _watcher = watcher;
            while rx.recv().await.is_some() {
                log::info!("rc file changed on disk, re-validating open documents");
                let passes = controller.lock().await.watched_files_changed();
                for pass in passes {
                    deliver_pass(&client, &controller, pass).await;
                }
            }
        });

        Ok(())
    }
}

/// Publish or report one validation pass, unless it went stale while the
/// engine was running.
pub(crate) async fn deliver_pass(
    client: &Client,
    controller: &Arc<Mutex<Controller>>,
    pass: ValidationPass,
) {
    {
        let controller = controller.lock().await;
        if !controller.should_publish(&pass) {
            log::debug!(
                "dropping stale validation of {} (version {})",
                pass.uri,
                pass.version
            );
            return;
        }
    }

    match pass.outcome {
        ValidationOutcome::Publish(diagnostics) => {
            client
                .publish_diagnostics(pass.uri, diagnostics, Some(pass.version))
                .await;
        }
        ValidationOutcome::EngineFailure { notice, detail } => {
            client.show_message(MessageType::ERROR, notice).await;
            client.show_message(MessageType::ERROR, detail).await;
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(
        &self,
        params: InitializeParams,
    ) -> tower_lsp::jsonrpc::Result<InitializeResult> {
        let flags = CapabilityFlags::from_client(&params.capabilities);
        *self.capabilities.lock().await = flags;

        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| folder.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                let root_uri = params.root_uri.clone();
                root_uri.and_then(|uri| uri.to_file_path().ok())
            });
        *self.workspace_root.lock().await = root;

        let workspace = flags.workspace_folders.then(|| WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        });

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "lesshint-language-server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                workspace,
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let flags = *self.capabilities.lock().await;
        let rc_file = {
            let controller = self.controller.lock().await;
            controller.engine().config_file_name().to_string()
        };

        if flags.configuration {
            self.register_configuration_notifications().await;
        }

        if flags.watched_files {
            self.register_rc_file_watcher(&rc_file).await;
        } else {
            let root = self.workspace_root.lock().await.clone();
            if let Some(root) = root {
                if let Err(e) = self.start_fallback_watcher(root, rc_file) {
                    self.client
                        .log_message(
                            MessageType::WARNING,
                            format!("Failed to start fallback rc-file watcher: {e:#}"),
                        )
                        .await;
                }
            }
        }

        self.client
            .log_message(MessageType::INFO, "lesshint-language-server initialized")
            .await;
    }

    async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let pass = {
            let mut controller = self.controller.lock().await;
            controller.open_document(doc.uri, doc.text, doc.version)
        };
        if let Some(pass) = pass {
            self.deliver(pass).await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        // FULL sync: the last change carries the complete text.
        if let Some(change) = params.content_changes.into_iter().last() {
            let pass = {
                let mut controller = self.controller.lock().await;
                controller.change_document(uri, change.text, version)
            };
            if let Some(pass) = pass {
                self.deliver(pass).await;
            }
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let mut controller = self.controller.lock().await;
        controller.close_document(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        log::info!("configuration change received");
        let settings = ClientSettings::from_notification(&params.settings);
        let passes = {
            let mut controller = self.controller.lock().await;
            controller.update_settings(settings)
        };
        self.deliver_all(passes).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        log::info!("watched-file change received ({} events)", params.changes.len());
        let passes = {
            let mut controller = self.controller.lock().await;
            controller.watched_files_changed()
        };
        self.deliver_all(passes).await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        // Folder changes do not alter validation scope; log them only.
        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "workspace folders changed: {} added, {} removed",
                    params.event.added.len(),
                    params.event.removed.len()
                ),
            )
            .await;
    }
}
