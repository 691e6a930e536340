//! Server bootstrap: wire the engine and backend to stdio.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

use crate::engine::{LesshintCli, LintEngine};
use crate::lsp::backend::Backend;
use crate::Config;

/// Start the LSP server over stdio.
pub async fn serve(config: Config) -> Result<()> {
    let engine: Arc<dyn LintEngine> = Arc::new(LesshintCli::new(config.lesshint_path.clone()));
    log::info!(
        "starting lesshint-language-server (engine: {})",
        config.lesshint_path.display()
    );

    // If running under the integration test, exit after a short delay so the
    // test can read stdout to EOF.
    if std::env::var("LESSHINT_LS_TEST_EXIT").as_deref() == Ok("1") {
        thread::spawn(|| {
            thread::sleep(Duration::from_secs(1));
            std::process::exit(0);
        });
    }

    let (service, socket) =
        LspService::build(move |client| Backend::new(client, engine)).finish();

    Server::new(stdin(), stdout(), socket).serve(service).await;

    Ok(())
}
