//! Server readiness monitoring.
//!
//! Two concurrent observers feed one ordered channel: a classifier over the
//! server's stderr, and a poller against `/health`. The first terminal event
//! (ready or error) wins; anything after it is dropped, so consumers see at
//! most one terminal event followed by channel close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// How often the poller hits `/health`.
const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Readiness budget when the model is already on disk.
const CACHED_BUDGET: Duration = Duration::from_secs(30);

/// Readiness budget when the model may have to be downloaded first.
const UNCACHED_BUDGET: Duration = Duration::from_secs(30 * 60);

/// stderr marker: the server decided it has to fetch the model.
const DOWNLOAD_MARKER: &str = "trying to download model";

/// stderr marker: HF refused the model. Matched before the generic error
/// marker because the line contains it.
const GATED_MODEL_MARKER: &str = "error: model is private or does not exist; \
     if you are accessing a gated model, please provide a valid HF token";

/// stderr marker: any other fatal server error.
const ERROR_MARKER: &str = "error:";

/// How long the monitor waits for readiness.
pub fn readiness_budget(model_cached: bool) -> Duration {
    if model_cached {
        CACHED_BUDGET
    } else {
        UNCACHED_BUDGET
    }
}

/// Poll cadence and budget for one monitor session.
#[derive(Debug, Clone, Copy)]
pub struct MonitorTiming {
    pub poll_interval: Duration,
    pub budget: Duration,
}

impl MonitorTiming {
    pub fn for_cache_state(model_cached: bool) -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            budget: readiness_budget(model_cached),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Startup is underway; more events will follow.
    Progress,
    /// The server answered `/health` with 200. Last event of the session.
    Ready,
    /// Startup failed. Last event of the session.
    Error,
}

/// One observation from the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub message: String,
    pub kind: StatusKind,
}

impl StatusEvent {
    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: StatusKind::Progress,
        }
    }

    pub fn ready() -> Self {
        Self {
            message: "Ready".to_string(),
            kind: StatusKind::Ready,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: StatusKind::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }

    /// Terminal events end the monitor session.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, StatusKind::Ready | StatusKind::Error)
    }
}

/// Sender shared by both observers. Enforces the session contract: the
/// first terminal event wins, cancels the poller, and suppresses every
/// event after it.
#[derive(Clone)]
struct StatusSender {
    tx: mpsc::Sender<StatusEvent>,
    terminal_sent: Arc<AtomicBool>,
    poller_cancel: CancellationToken,
}

impl StatusSender {
    async fn send(&self, event: StatusEvent) {
        if event.is_terminal() {
            if self.terminal_sent.swap(true, Ordering::SeqCst) {
                trace!(?event, "Dropping terminal event after session already ended");
                return;
            }
            self.poller_cancel.cancel();
        } else if self.terminal_sent.load(Ordering::SeqCst) {
            return;
        }
        // Receiver dropped means nobody is watching anymore; nothing to do.
        let _ = self.tx.send(event).await;
    }
}

/// Starts the monitor for one server session and returns its event channel.
///
/// The channel closes only after both the stderr classifier and the health
/// poller have finished. The poller stops on `cancel` or on the first
/// terminal event; the classifier runs until the stderr pipe closes, which
/// happens when the server process exits.
pub(crate) fn spawn_monitor<R>(
    stderr: Option<R>,
    model: String,
    base_url: String,
    model_cached: bool,
    timing: MonitorTiming,
    cancel: CancellationToken,
) -> mpsc::Receiver<StatusEvent>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    let poller_cancel = cancel.child_token();
    let sender = StatusSender {
        tx,
        terminal_sent: Arc::new(AtomicBool::new(false)),
        poller_cancel: poller_cancel.clone(),
    };

    tokio::spawn(async move {
        if !model_cached {
            sender
                .send(StatusEvent::progress(format!(
                    "Model '{model}' is not cached, download may be required"
                )))
                .await;
        }
        sender
            .send(StatusEvent::progress("Starting llama-server"))
            .await;

        let classifier = stderr.map(|stderr| {
            let sender = sender.clone();
            let model = model.clone();
            tokio::spawn(async move {
                classify_stderr(stderr, &model, &sender).await;
            })
        });

        poll_health(&base_url, timing, &poller_cancel, &sender).await;

        // Hold our sender until the classifier is done too, so the channel
        // stays open while either observer could still produce an event.
        if let Some(handle) = classifier {
            let _ = handle.await;
        }
        debug!("Status monitor finished");
    });

    rx
}

/// Reads stderr line by line and forwards the lines that mean something.
async fn classify_stderr<R: AsyncRead + Unpin>(reader: R, model: &str, sender: &StatusSender) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        trace!(line, "llama-server stderr");
        if let Some(event) = classify_line(&line, model) {
            sender.send(event).await;
        }
    }
}

/// Maps one stderr line to a status event, or `None` for noise.
fn classify_line(line: &str, model: &str) -> Option<StatusEvent> {
    if line.contains(GATED_MODEL_MARKER) {
        Some(StatusEvent::error(format!(
            "Model '{model}' is private or does not exist; try a different model or provide an HF token"
        )))
    } else if line.contains(DOWNLOAD_MARKER) {
        Some(StatusEvent::progress(format!(
            "Downloading model '{model}', this can take a while..."
        )))
    } else if line.contains(ERROR_MARKER) {
        Some(StatusEvent::error(line.to_string()))
    } else {
        None
    }
}

/// Polls `/health` until the server is ready, the budget runs out, or the
/// token is cancelled. Connection errors while the socket is not listening
/// yet are normal and skipped.
async fn poll_health(
    base_url: &str,
    timing: MonitorTiming,
    cancel: &CancellationToken,
    sender: &StatusSender,
) {
    let health_url = format!("{base_url}/health");
    let client = reqwest::Client::new();

    let mut ticker = tokio::time::interval(timing.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = tokio::time::sleep(timing.budget);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            () = &mut deadline => {
                sender
                    .send(StatusEvent::error("Timed out waiting for llama-server to become ready"))
                    .await;
                return;
            }
            _ = ticker.tick() => {
                // A hung response must not hold the tick arm past the
                // budget deadline.
                let request = client
                    .get(&health_url)
                    .timeout(timing.poll_interval * 2);
                let Ok(response) = request.send().await else {
                    continue;
                };
                match response.status().as_u16() {
                    200 => {
                        sender.send(StatusEvent::ready()).await;
                        return;
                    }
                    503 => {
                        sender.send(StatusEvent::progress("Loading model")).await;
                    }
                    code => {
                        sender
                            .send(StatusEvent::error(format!("llama-server health check failed: HTTP {code}")))
                            .await;
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_timing() -> MonitorTiming {
        MonitorTiming {
            poll_interval: Duration::from_millis(20),
            budget: Duration::from_secs(5),
        }
    }

    async fn collect(mut rx: mpsc::Receiver<StatusEvent>) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_classify_line_download() {
        let event = classify_line(
            "common_download: trying to download model from HF",
            "org/model",
        )
        .expect("classified");
        assert_eq!(event.kind, StatusKind::Progress);
        assert!(event.message.contains("org/model"));
    }

    #[test]
    fn test_classify_line_gated_model_is_friendly_error() {
        let line = format!("llama-server: {GATED_MODEL_MARKER}");
        let event = classify_line(&line, "org/model").expect("classified");
        assert_eq!(event.kind, StatusKind::Error);
        assert!(event.message.contains("org/model"));
        assert!(event.message.contains("different model"));
    }

    #[test]
    fn test_classify_line_generic_error_passes_through() {
        let event =
            classify_line("error: failed to load model", "org/model").expect("classified");
        assert_eq!(event.kind, StatusKind::Error);
        assert_eq!(event.message, "error: failed to load model");
    }

    #[test]
    fn test_classify_line_drops_noise() {
        assert!(classify_line("llama_model_loader: loaded meta data", "m").is_none());
        assert!(classify_line("", "m").is_none());
    }

    #[test]
    fn test_readiness_budget() {
        assert_eq!(readiness_budget(true), Duration::from_secs(30));
        assert_eq!(readiness_budget(false), Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_monitor_reports_loading_then_ready() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;

        let rx = spawn_monitor(
            Some(tokio::io::empty()),
            "org/model".to_string(),
            mock.uri(),
            true,
            test_timing(),
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        assert_eq!(events[0], StatusEvent::progress("Starting llama-server"));
        let loading = events
            .iter()
            .filter(|e| e.message == "Loading model")
            .count();
        assert_eq!(loading, 3);
        assert_eq!(events.last().expect("events").kind, StatusKind::Ready);
    }

    #[tokio::test]
    async fn test_monitor_uncached_model_announces_download() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;

        let rx = spawn_monitor(
            Some(tokio::io::empty()),
            "org/model".to_string(),
            mock.uri(),
            false,
            test_timing(),
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        assert!(events[0].message.contains("not cached"));
        assert_eq!(events[1], StatusEvent::progress("Starting llama-server"));
    }

    #[tokio::test]
    async fn test_stderr_error_ends_session_without_ready() {
        // No server behind this port, so the poller only sees connection
        // errors and the stderr classifier decides the outcome.
        let stderr = Cursor::new(
            format!("llama_model_loader: meta\nllama-server: {GATED_MODEL_MARKER}\n").into_bytes(),
        );
        let rx = spawn_monitor(
            Some(stderr),
            "org/model".to_string(),
            "http://127.0.0.1:9".to_string(),
            true,
            MonitorTiming {
                poll_interval: Duration::from_millis(20),
                budget: Duration::from_millis(500),
            },
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        let last = events.last().expect("events");
        assert_eq!(last.kind, StatusKind::Error);
        assert!(last.message.contains("private or does not exist"));
        assert!(events.iter().all(|e| e.kind != StatusKind::Ready));
    }

    #[tokio::test]
    async fn test_at_most_one_terminal_event() {
        // Two fatal stderr lines plus a poller timeout all race; exactly one
        // terminal event must come out.
        let stderr = Cursor::new(
            "error: first failure\nerror: second failure\n".as_bytes().to_vec(),
        );
        let rx = spawn_monitor(
            Some(stderr),
            "org/model".to_string(),
            "http://127.0.0.1:9".to_string(),
            true,
            MonitorTiming {
                poll_interval: Duration::from_millis(10),
                budget: Duration::from_millis(50),
            },
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        let terminal = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminal, 1);
        assert!(events.last().expect("events").is_terminal());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_times_out() {
        let rx = spawn_monitor(
            Some(tokio::io::empty()),
            "org/model".to_string(),
            "http://127.0.0.1:9".to_string(),
            true,
            MonitorTiming {
                poll_interval: Duration::from_millis(10),
                budget: Duration::from_millis(80),
            },
            CancellationToken::new(),
        );
        let events = collect(rx).await;

        let last = events.last().expect("events");
        assert_eq!(last.kind, StatusKind::Error);
        assert!(last.message.contains("Timed out"));
    }

    #[tokio::test]
    async fn test_hung_health_response_does_not_stall_the_budget() {
        // The server accepts the request but never answers in time; the
        // budget deadline must still fire on schedule.
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_secs(30)))
            .mount(&mock)
            .await;

        let rx = spawn_monitor(
            Some(tokio::io::empty()),
            "org/model".to_string(),
            mock.uri(),
            true,
            MonitorTiming {
                poll_interval: Duration::from_millis(20),
                budget: Duration::from_millis(120),
            },
            CancellationToken::new(),
        );
        let events = tokio::time::timeout(Duration::from_secs(2), collect(rx))
            .await
            .expect("monitor finished within the budget");

        let last = events.last().expect("events");
        assert_eq!(last.kind, StatusKind::Error);
        assert!(last.message.contains("Timed out"));
    }

    #[tokio::test]
    async fn test_cancellation_closes_channel_without_terminal_event() {
        let cancel = CancellationToken::new();
        let rx = spawn_monitor(
            Some(tokio::io::empty()),
            "org/model".to_string(),
            "http://127.0.0.1:9".to_string(),
            true,
            test_timing(),
            cancel.clone(),
        );
        cancel.cancel();
        let events = collect(rx).await;

        assert!(events.iter().all(|e| !e.is_terminal()));
    }
}
