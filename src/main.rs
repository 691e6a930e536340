use anyhow::Result;
use env_logger::Env;

use lesshint_language_server::lsp::server;
use lesshint_language_server::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let config = Config::from_args_and_env()?;

    // RUST_LOG overrides --log-level
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str())).init();

    server::serve(config).await
}
