//! One-shot mode: edit a single piece of text without the TUI.
//!
//! Starts llama-server, prints status updates to stderr until the server is
//! ready, streams the completion to stdout, and stops the server.

use std::io::Write;

use anyhow::Result;
use futures_util::StreamExt;
use redraft_core::client::{CompletionClient, CompletionRequest};
use redraft_core::config::Config;
use redraft_core::server::LlamaServer;
use redraft_core::server::status::StatusKind;
use tokio_util::sync::CancellationToken;

pub async fn run(config: &Config, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("Please provide some text to edit.");
    }

    let mut server = LlamaServer::start(&config.model, config.port)?;
    let cancel = CancellationToken::new();
    let mut status_rx = server.status_updates(cancel.clone());

    let mut ready = false;
    while let Some(event) = status_rx.recv().await {
        match event.kind {
            StatusKind::Progress => eprintln!("{}", event.message),
            StatusKind::Ready => {
                ready = true;
                break;
            }
            StatusKind::Error => {
                cancel.cancel();
                server.stop();
                anyhow::bail!("{}", event.message);
            }
        }
    }
    if !ready {
        server.stop();
        anyhow::bail!("llama-server stopped before becoming ready");
    }

    let client = CompletionClient::new(server.base_url());
    let result = stream_completion(
        &client,
        config,
        text,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await;

    cancel.cancel();
    server.stop();
    result
}

/// Streams the completion to `out` and, once it finishes, a closing
/// marker to `status` so piped stdout stays clean.
async fn stream_completion(
    client: &CompletionClient,
    config: &Config,
    text: &str,
    out: &mut impl Write,
    status: &mut impl Write,
) -> Result<()> {
    let request = CompletionRequest {
        prompt: format!("{}: {}", config.instruction, text),
        temperature: config.temperature,
        n_predict: config.n_predict,
    };

    let mut stream = client.complete(&request).await?;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        write!(out, "{}", chunk.content)?;
        out.flush()?;
    }
    writeln!(out)?;
    writeln!(status, "Inference completed")?;
    Ok(())
}
