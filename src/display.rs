/// Display collaborator: a sink that runs on its own task and a handle the
/// agent uses to hand it values.
///
/// Each `render` is a rendezvous. The request goes through a capacity-1
/// channel and the caller waits for the display task to acknowledge that the
/// text was applied, so the agent can never queue up stale values.
use std::io::Write;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// External sink that shows the current value.
pub trait Render: Send + 'static {
    /// Apply `text` to the display. An `Err` is reported back to the agent.
    fn render(&mut self, text: &str) -> Result<(), String>;
}

/// Errors from a single render rendezvous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The display task has exited; no further render can succeed.
    Closed,
    /// The display task dropped the acknowledgement without answering.
    Cancelled,
    /// No acknowledgement arrived within the configured timeout.
    TimedOut(Duration),
    /// The sink reported a failure while applying the text.
    Rejected(String),
}

impl RenderError {
    /// Whether retrying can ever succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderError::Closed)
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Closed => write!(f, "display task is closed"),
            RenderError::Cancelled => write!(f, "render acknowledgement was cancelled"),
            RenderError::TimedOut(after) => {
                write!(f, "render not acknowledged within {}ms", after.as_millis())
            }
            RenderError::Rejected(reason) => write!(f, "display rejected update: {}", reason),
        }
    }
}

impl std::error::Error for RenderError {}

struct RenderRequest {
    text: String,
    ack: oneshot::Sender<Result<(), String>>,
}

/// Sending half of the rendezvous, held by the agent.
#[derive(Clone)]
pub struct DisplayHandle {
    tx: mpsc::Sender<RenderRequest>,
    ack_timeout: Duration,
}

impl DisplayHandle {
    /// Hand `text` to the display task and wait until it has been applied.
    ///
    /// The timeout covers both handing the request over and the
    /// acknowledgement, so a stalled display cannot hold the caller longer
    /// than `ack_timeout`.
    pub async fn render(&self, text: String) -> Result<(), RenderError> {
        let exchange = async {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.tx
                .send(RenderRequest { text, ack: ack_tx })
                .await
                .map_err(|_| RenderError::Closed)?;
            ack_rx
                .await
                .map_err(|_| RenderError::Cancelled)?
                .map_err(RenderError::Rejected)
        };

        match tokio::time::timeout(self.ack_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::TimedOut(self.ack_timeout)),
        }
    }
}

/// Start the display task that owns `sink`.
///
/// Each update is applied on the blocking pool, so a sink that does blocking
/// I/O never stalls the runtime the agent and its timers run on. The task
/// runs until every `DisplayHandle` is dropped.
pub fn spawn_display<R: Render>(mut sink: R, ack_timeout: Duration) -> (DisplayHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<RenderRequest>(1);

    let handle = tokio::spawn(async move {
        while let Some(RenderRequest { text, ack }) = rx.recv().await {
            let applied = tokio::task::spawn_blocking(move || {
                let result = sink.render(&text);
                (sink, text, result)
            })
            .await;

            let (returned, text, result) = match applied {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(error = %e, "display sink panicked, closing display");
                    break;
                }
            };
            sink = returned;

            if let Err(ref reason) = result {
                tracing::debug!(%text, %reason, "display sink rejected update");
            }
            // The agent may have timed out and gone away; nothing to do then.
            let _ = ack.send(result);
        }
        tracing::debug!("display task exiting");
    });

    (DisplayHandle { tx, ack_timeout }, handle)
}

/// Writes each value as its own line, e.g. to stdout.
pub struct TerminalDisplay<W> {
    out: W,
}

impl<W: Write + Send + 'static> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send + 'static> Render for TerminalDisplay<W> {
    fn render(&mut self, text: &str) -> Result<(), String> {
        writeln!(self.out, "{text}")
            .and_then(|_| self.out.flush())
            .map_err(|e| e.to_string())
    }
}
