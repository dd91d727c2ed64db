//! llama-server process supervision.
//!
//! Spawning returns a handle immediately; readiness is observed through the
//! status monitor in [`status`], never verified synchronously here.

pub mod cache;
pub mod status;

use std::fmt;
use std::io;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::server::status::{MonitorTiming, StatusEvent};

/// Name of the server executable looked up on the search path.
const SERVER_EXECUTABLE: &str = "llama-server";

/// Failure to bring up the server process. Fatal for the session.
#[derive(Debug)]
pub enum StartError {
    /// llama-server was not found on the search path.
    ExecutableNotFound,
    /// The process could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::ExecutableNotFound => write!(
                f,
                "{SERVER_EXECUTABLE} not found; install llama.cpp and make sure it is on your PATH"
            ),
            StartError::Spawn(e) => write!(f, "failed to start {SERVER_EXECUTABLE}: {e}"),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartError::ExecutableNotFound => None,
            StartError::Spawn(e) => Some(e),
        }
    }
}

/// Handle to a supervised llama-server process.
///
/// Owns the child process and its stderr pipe. The handle is owned by
/// exactly one consumer; `stop` is idempotent and `Drop` repeats it as a
/// backstop so the process never outlives the session.
pub struct LlamaServer {
    child: Child,
    port: u16,
    base_url: String,
    model: String,
    model_cached: bool,
    stderr: Option<ChildStderr>,
}

impl LlamaServer {
    /// Spawns `llama-server -hf <model> --port <port>` with stderr piped.
    ///
    /// Checks the model cache first so the monitor can size its readiness
    /// budget; a cache lookup failure just means "not cached". Returns as
    /// soon as the process is running.
    pub fn start(model: &str, port: u16) -> Result<Self, StartError> {
        let executable =
            which::which(SERVER_EXECUTABLE).map_err(|_| StartError::ExecutableNotFound)?;

        let model_cached = match cache::resolve_cache_dir() {
            Ok(dir) => cache::is_model_cached(model, &dir).unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "Could not resolve model cache dir, assuming not cached");
                false
            }
        };

        let mut child = Command::new(&executable)
            .arg("-hf")
            .arg(model)
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(StartError::Spawn)?;

        debug!(
            model,
            port,
            model_cached,
            pid = child.id(),
            "Spawned llama-server"
        );

        let stderr = child.stderr.take();
        Ok(Self {
            child,
            port,
            base_url: format!("http://localhost:{port}"),
            model: model.to_string(),
            model_cached,
            stderr,
        })
    }

    /// Base URL of the server's HTTP interface.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the model was already present in the local cache at spawn.
    pub fn model_cached(&self) -> bool {
        self.model_cached
    }

    /// Starts the status monitor for this server session.
    ///
    /// Takes the stderr pipe; can only be called once per handle. The
    /// returned receiver closes after both the stderr classifier and the
    /// health poller have finished, with exactly one terminal event in
    /// between. `cancel` stops the poller between ticks; the stderr reader
    /// has no forced cancel and ends when the process exits and closes the
    /// pipe, so callers must `stop` the server on every exit path.
    pub fn status_updates(
        &mut self,
        cancel: CancellationToken,
    ) -> tokio::sync::mpsc::Receiver<StatusEvent> {
        status::spawn_monitor(
            self.stderr.take(),
            self.model.clone(),
            self.base_url.clone(),
            self.model_cached,
            MonitorTiming::for_cache_state(self.model_cached),
            cancel,
        )
    }

    /// Kills the server process. Idempotent: safe to call any number of
    /// times, including after the process already exited on its own.
    pub fn stop(&mut self) {
        match self.child.start_kill() {
            Ok(()) => debug!(port = self.port, "Stopped llama-server"),
            // Already exited or already killed.
            Err(e) => debug!(port = self.port, error = %e, "Stop was a no-op"),
        }
    }
}

impl Drop for LlamaServer {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}
