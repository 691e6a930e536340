//! Document validation controller.
//!
//! Owns the authoritative set of tracked documents, the configuration
//! cache, and the client settings, and drives the validation pipeline. One
//! handler per incoming event kind; each handler returns the validation
//! passes it produced so the transport layer decides how to deliver them,
//! which keeps this module testable without a live LSP connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tower_lsp::lsp_types::{Diagnostic, Url};

use crate::cache::{ConfigCache, ResolutionRoot};
use crate::config::ClientSettings;
use crate::engine::LintEngine;
use crate::translate::convert_diagnostics;

/// State for each open document. Text is replaced wholesale on change
/// (FULL sync); there is no incremental patching.
#[derive(Debug)]
pub struct TrackedDocument {
    pub text: String,
    pub version: i32,
}

/// What one validation produced for one document.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// Replace the document's published diagnostics (empty list clears)
    Publish(Vec<Diagnostic>),
    /// Engine failed: keep prior diagnostics, show both messages to the user
    EngineFailure { notice: String, detail: String },
}

/// One completed validation, tagged with the version it ran against.
#[derive(Debug)]
pub struct ValidationPass {
    pub uri: Url,
    pub version: i32,
    pub outcome: ValidationOutcome,
}

/// Orchestrates validation across all tracked documents.
pub struct Controller {
    engine: Arc<dyn LintEngine>,
    documents: HashMap<Url, TrackedDocument>,
    cache: ConfigCache,
    settings: ClientSettings,
}

impl Controller {
    pub fn new(engine: Arc<dyn LintEngine>) -> Self {
        Self {
            engine,
            documents: HashMap::new(),
            cache: ConfigCache::new(),
            settings: ClientSettings::default(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn LintEngine> {
        &self.engine
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn document(&self, uri: &Url) -> Option<&TrackedDocument> {
        self.documents.get(uri)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Document opened: track it and validate.
    pub fn open_document(&mut self, uri: Url, text: String, version: i32) -> Option<ValidationPass> {
        self.documents
            .insert(uri.clone(), TrackedDocument { text, version });
        self.validate(&uri)
    }

    /// Document changed: replace its content and validate.
    pub fn change_document(
        &mut self,
        uri: Url,
        text: String,
        version: i32,
    ) -> Option<ValidationPass> {
        self.documents
            .insert(uri.clone(), TrackedDocument { text, version });
        self.validate(&uri)
    }

    /// Document closed: only the tracked entry is removed. Configuration
    /// cached under the document's resolution root stays for other
    /// documents sharing it.
    pub fn close_document(&mut self, uri: &Url) {
        self.documents.remove(uri);
    }

    /// Client settings changed: drop all cached configuration and
    /// re-validate every tracked document.
    pub fn update_settings(&mut self, settings: ClientSettings) -> Vec<ValidationPass> {
        self.settings = settings;
        self.cache.invalidate_all();
        self.validate_all()
    }

    /// A watched rc file changed somewhere in the workspace. One rc change
    /// cannot be cheaply mapped to the documents it affects, so the whole
    /// cache is dropped and every tracked document re-validated.
    pub fn watched_files_changed(&mut self) -> Vec<ValidationPass> {
        self.cache.invalidate_all();
        self.validate_all()
    }

    fn validate_all(&mut self) -> Vec<ValidationPass> {
        let uris: Vec<Url> = self.documents.keys().cloned().collect();
        uris.iter().filter_map(|uri| self.validate(uri)).collect()
    }

    /// Run the full pipeline for one tracked document: resolve config
    /// through the cache, call the engine, translate findings.
    pub fn validate(&mut self, uri: &Url) -> Option<ValidationPass> {
        let doc = self.documents.get(uri)?;
        let version = doc.version;
        let path = uri.to_file_path().ok();

        let (root, root_dir) = self.resolution_root(path.as_deref());
        let result = self
            .cache
            .get_or_resolve(&root, || self.engine.resolve_config(&root_dir))
            .and_then(|config| self.engine.check(&doc.text, path.as_deref(), &config));

        let outcome = match result {
            Ok(findings) => {
                ValidationOutcome::Publish(convert_diagnostics(&findings, self.engine.name()))
            }
            Err(err) => {
                log::warn!("validation of {} failed: {:#}", uri, err);
                ValidationOutcome::EngineFailure {
                    notice: format!("{} couldn't check this file.", self.engine.name()),
                    detail: normalize_failure_detail(&err),
                }
            }
        };

        Some(ValidationPass {
            uri: uri.clone(),
            version,
            outcome,
        })
    }

    /// Staleness guard: a pass may only be published while its version is
    /// still the tracked one. A validation for version N that finishes
    /// after version N+1 was recorded must never overwrite the newer
    /// result.
    pub fn should_publish(&self, pass: &ValidationPass) -> bool {
        self.documents
            .get(&pass.uri)
            .is_some_and(|doc| doc.version == pass.version)
    }

    fn resolution_root(&self, path: Option<&Path>) -> (ResolutionRoot, PathBuf) {
        if self.settings.global_config {
            (ResolutionRoot::Global, self.settings.global_dir())
        } else {
            // Untitled buffers have no directory; fall back to the server's
            // working directory.
            let dir = path
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| {
                    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
                });
            (ResolutionRoot::Directory(dir.clone()), dir)
        }
    }
}

/// Flatten an engine failure into a single line for a showMessage popup.
fn normalize_failure_detail(err: &anyhow::Error) -> String {
    let chained = format!("{:#}", err);
    let collapsed = chained.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "unknown engine failure".to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, bail, Result};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::engine::NativeFinding;

    #[derive(Default)]
    struct StubEngine {
        findings: Mutex<Vec<NativeFinding>>,
        resolve_calls: AtomicUsize,
        check_calls: AtomicUsize,
        fail_resolve: AtomicBool,
        fail_check: AtomicBool,
        last_resolve_root: Mutex<Option<PathBuf>>,
    }

    impl StubEngine {
        fn with_findings(findings: Vec<NativeFinding>) -> Arc<Self> {
            let stub = Self::default();
            *stub.findings.lock().unwrap() = findings;
            Arc::new(stub)
        }

        fn resolves(&self) -> usize {
            self.resolve_calls.load(Ordering::SeqCst)
        }

        fn checks(&self) -> usize {
            self.check_calls.load(Ordering::SeqCst)
        }
    }

    impl LintEngine for StubEngine {
        fn name(&self) -> &str {
            "lesshint"
        }

        fn config_file_name(&self) -> &str {
            ".lesshintrc"
        }

        fn resolve_config(&self, root: &Path) -> Result<Value> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_resolve_root.lock().unwrap() = Some(root.to_path_buf());
            if self.fail_resolve.load(Ordering::SeqCst) {
                bail!("could not locate config under {}", root.display());
            }
            Ok(json!({}))
        }

        fn check(
            &self,
            _text: &str,
            _path: Option<&Path>,
            _config: &Value,
        ) -> Result<Vec<NativeFinding>> {
            self.check_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_check.load(Ordering::SeqCst) {
                return Err(anyhow!("parse error:\n  unexpected token\n  at line 1"));
            }
            Ok(self.findings.lock().unwrap().clone())
        }
    }

    fn warning(line: u32, column: u32, linter: &str, message: &str) -> NativeFinding {
        NativeFinding {
            line,
            column,
            message: message.to_string(),
            linter: linter.to_string(),
            severity: "warning".to_string(),
        }
    }

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///work/{name}")).expect("uri")
    }

    #[test]
    fn open_tracks_and_publishes() {
        let engine = StubEngine::with_findings(vec![warning(1, 3, "spaceBeforeBrace", "missing space")]);
        let mut controller = Controller::new(engine.clone());

        let pass = controller
            .open_document(uri("a.less"), "a{ }".to_string(), 1)
            .expect("pass");

        assert_eq!(controller.document_count(), 1);
        assert_eq!(pass.version, 1);
        match pass.outcome {
            ValidationOutcome::Publish(diagnostics) => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].source.as_deref(), Some("lesshint"));
            }
            other => panic!("expected publish, got {other:?}"),
        }
        assert_eq!(engine.checks(), 1);
    }

    #[test]
    fn change_replaces_content_wholesale() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine);

        controller.open_document(uri("a.less"), "a { }".to_string(), 1);
        controller.change_document(uri("a.less"), "b { }".to_string(), 2);

        let doc = controller.document(&uri("a.less")).expect("tracked");
        assert_eq!(doc.text, "b { }");
        assert_eq!(doc.version, 2);
        assert_eq!(controller.document_count(), 1);
    }

    #[test]
    fn close_removes_only_the_document_entry() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine.clone());

        controller.open_document(uri("a.less"), "a { }".to_string(), 1);
        controller.open_document(uri("b.less"), "b { }".to_string(), 1);
        controller.close_document(&uri("a.less"));

        assert!(controller.document(&uri("a.less")).is_none());
        assert!(controller.validate(&uri("a.less")).is_none());

        // Both documents share /work; the cached config survives the close.
        let resolves_before = engine.resolves();
        controller.validate(&uri("b.less"));
        assert_eq!(engine.resolves(), resolves_before);
    }

    #[test]
    fn shared_root_resolves_config_once() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine.clone());

        controller.open_document(uri("a.less"), "a { }".to_string(), 1);
        controller.open_document(uri("b.less"), "b { }".to_string(), 1);

        assert_eq!(engine.resolves(), 1);
        assert_eq!(engine.checks(), 2);
    }

    #[test]
    fn settings_change_invalidates_and_revalidates_everything() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine.clone());

        controller.open_document(uri("a.less"), "a { }".to_string(), 1);
        controller.open_document(uri("b.less"), "b { }".to_string(), 1);
        assert_eq!(engine.resolves(), 1);

        let passes = controller.update_settings(ClientSettings::default());

        assert_eq!(passes.len(), 2);
        // Loaded -> Unloaded -> Loaded: exactly one fresh resolution for the
        // shared root.
        assert_eq!(engine.resolves(), 2);
        assert_eq!(engine.checks(), 4);
    }

    #[test]
    fn watched_file_change_invalidates_and_revalidates_everything() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine.clone());

        controller.open_document(uri("a.less"), "a { }".to_string(), 1);
        let passes = controller.watched_files_changed();

        assert_eq!(passes.len(), 1);
        assert_eq!(engine.resolves(), 2);
    }

    #[test]
    fn global_config_setting_resolves_from_global_dir() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine.clone());

        controller.update_settings(ClientSettings {
            global_config: true,
            global_config_dir: Some(PathBuf::from("/etc/lesshint")),
        });
        controller.open_document(uri("a.less"), "a { }".to_string(), 1);

        assert_eq!(
            engine.last_resolve_root.lock().unwrap().as_deref(),
            Some(Path::new("/etc/lesshint"))
        );
    }

    #[test]
    fn check_failure_keeps_diagnostics_and_reports_twice() {
        let engine = StubEngine::with_findings(vec![]);
        engine.fail_check.store(true, Ordering::SeqCst);
        let mut controller = Controller::new(engine.clone());

        let pass = controller
            .open_document(uri("a.less"), "a {".to_string(), 1)
            .expect("pass");

        match pass.outcome {
            ValidationOutcome::EngineFailure { notice, detail } => {
                assert_eq!(notice, "lesshint couldn't check this file.");
                assert!(!detail.contains('\n'), "detail must render on one line");
                assert!(detail.contains("unexpected token"));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // The document stays tracked; the next event retries.
        engine.fail_check.store(false, Ordering::SeqCst);
        let retry = controller
            .change_document(uri("a.less"), "a { }".to_string(), 2)
            .expect("pass");
        assert!(matches!(retry.outcome, ValidationOutcome::Publish(_)));
    }

    #[test]
    fn resolve_failure_takes_the_failure_path_and_stays_unloaded() {
        let engine = StubEngine::with_findings(vec![]);
        engine.fail_resolve.store(true, Ordering::SeqCst);
        let mut controller = Controller::new(engine.clone());

        let pass = controller
            .open_document(uri("a.less"), "a { }".to_string(), 1)
            .expect("pass");
        assert!(matches!(
            pass.outcome,
            ValidationOutcome::EngineFailure { .. }
        ));
        assert_eq!(engine.checks(), 0);

        // Unloaded slot: the next validation re-resolves and succeeds.
        engine.fail_resolve.store(false, Ordering::SeqCst);
        let retry = controller.validate(&uri("a.less")).expect("pass");
        assert!(matches!(retry.outcome, ValidationOutcome::Publish(_)));
        assert_eq!(engine.resolves(), 2);
    }

    #[test]
    fn stale_pass_is_not_published() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine);

        let stale = controller
            .open_document(uri("a.less"), "a { }".to_string(), 1)
            .expect("pass");
        let fresh = controller
            .change_document(uri("a.less"), "b { }".to_string(), 2)
            .expect("pass");

        assert!(!controller.should_publish(&stale));
        assert!(controller.should_publish(&fresh));
    }

    #[test]
    fn pass_for_closed_document_is_not_published() {
        let engine = StubEngine::with_findings(vec![]);
        let mut controller = Controller::new(engine);

        let pass = controller
            .open_document(uri("a.less"), "a { }".to_string(), 1)
            .expect("pass");
        controller.close_document(&uri("a.less"));

        assert!(!controller.should_publish(&pass));
    }

    #[test]
    fn revalidation_of_unchanged_document_is_idempotent() {
        let engine = StubEngine::with_findings(vec![warning(2, 4, "finalNewline", "missing newline")]);
        let mut controller = Controller::new(engine);

        let first = controller
            .open_document(uri("a.less"), "a { }".to_string(), 1)
            .expect("pass");
        let second = controller.validate(&uri("a.less")).expect("pass");

        let (ValidationOutcome::Publish(a), ValidationOutcome::Publish(b)) =
            (first.outcome, second.outcome)
        else {
            panic!("expected two publishes");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn failure_detail_is_collapsed_to_one_line() {
        let err = anyhow!("first line\nsecond line\r\n\tthird");
        assert_eq!(
            normalize_failure_detail(&err),
            "first line second line third"
        );
    }
}
