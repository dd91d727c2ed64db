//! Full-screen TUI for redraft.

pub mod diff;
pub mod effects;
pub mod events;
pub mod input;
pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod update;

use std::io::{IsTerminal, stderr};

use anyhow::Result;
use redraft_core::config::Config;
use redraft_core::server::LlamaServer;
pub use runtime::TuiRuntime;
use tokio_util::sync::CancellationToken;

/// Runs the interactive editing session.
///
/// Starts llama-server, runs the TUI against it, and stops the server on
/// every exit path (quit, error, panic via `Drop`).
pub async fn run(config: Config) -> Result<()> {
    if !stderr().is_terminal() {
        anyhow::bail!(
            "Interactive mode requires a terminal.\n\
             Use `redraft 'some text'` for one-shot execution."
        );
    }

    let mut server = LlamaServer::start(&config.model, config.port)?;
    let cancel = CancellationToken::new();
    let status_rx = server.status_updates(cancel.clone());

    let base_url = server.base_url().to_string();
    let result = match TuiRuntime::new(config, &base_url, status_rx) {
        Ok(mut runtime) => runtime.run().and_then(|()| {
            // A fatal server error ends the loop too; surface it as the
            // process error once the terminal is restored.
            if let state::Phase::Failed { message } = &runtime.state.phase {
                Err(anyhow::anyhow!(message.clone()))
            } else {
                Ok(())
            }
        }),
        Err(e) => Err(e),
    };

    cancel.cancel();
    server.stop();
    result
}
