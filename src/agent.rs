/// Counter agent: the background loop that shows the counter, advances it,
/// and sleeps one tick, until it is told to stop.
///
/// Stopping is cooperative. `stop_counting()` flips a monotonic flag and
/// cancels a token; the loop notices it at the end of the current iteration
/// (the tick sleep is cut short). When the loop exits the controls are
/// disabled exactly once and the state moves to `Stopped`.
use crate::config::AgentConfig;
use crate::controls::Controls;
use crate::counter::{Counter, Direction};
use crate::display::{DisplayHandle, RenderError};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::summary::{RunSummary, StopReason};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Running,
    /// Terminal: the loop has exited and the controls are disabled.
    Stopped,
}

#[derive(Debug)]
pub enum AgentError {
    /// `run` was called on an agent whose loop already ran.
    AlreadyStarted,
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::AlreadyStarted => write!(f, "agent loop was already started"),
        }
    }
}

impl std::error::Error for AgentError {}

pub struct Agent {
    counter: Arc<Counter>,
    tick: Duration,
    max_render_retries: u32,
    stop_requested: AtomicBool,
    stop: CancellationToken,
    started: AtomicBool,
    state: watch::Sender<AgentState>,
}

impl Agent {
    pub fn new(counter: Arc<Counter>, config: &AgentConfig) -> Self {
        let (state, _) = watch::channel(AgentState::Running);
        Self {
            counter,
            tick: config.tick(),
            max_render_retries: 0,
            stop_requested: AtomicBool::new(false),
            stop: CancellationToken::new(),
            started: AtomicBool::new(false),
            state,
        }
    }

    /// How many times a failed render is retried before its step is skipped.
    pub fn with_render_retries(mut self, max_retries: u32) -> Self {
        self.max_render_retries = max_retries;
        self
    }

    #[allow(dead_code)]
    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    /// Count up from the next step on.
    pub fn increased_timer(&self) {
        self.counter.set_direction(Direction::Up);
    }

    /// Count down from the next step on.
    pub fn decreased_timer(&self) {
        self.counter.set_direction(Direction::Down);
    }

    /// Ask the loop to stop. Idempotent and callable from any context.
    ///
    /// Returns `true` only for the call that actually requested the stop.
    pub fn stop_counting(&self) -> bool {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.stop.cancel();
        info!(value = self.counter.read(), "stop requested");
        true
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Token cancelled on the first `stop_counting()`.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    #[allow(dead_code)]
    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Wait until the loop has exited and the controls are disabled.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|s| *s == AgentState::Stopped).await;
    }

    /// Run the counting loop until a stop is requested.
    ///
    /// Each iteration reads the counter, waits for the display to apply the
    /// value, steps the counter and sleeps one tick. A value the display
    /// never acknowledged is not stepped past. A closed display stops the
    /// agent. Both the rendezvous and the sleep end early on a stop request,
    /// so a slow display does not delay stopping.
    pub async fn run(
        &self,
        display: &DisplayHandle,
        controls: &dyn Controls,
    ) -> Result<RunSummary, AgentError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(AgentError::AlreadyStarted);
        }

        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let mut retry = RetryPolicy::new(self.max_render_retries);
        let mut renders = 0u64;
        let mut steps = 0u64;
        let mut skipped_steps = 0u64;
        let mut stop_reason = StopReason::Requested;

        info!(
            tick_ms = self.tick.as_millis() as u64,
            value = self.counter.read(),
            direction = %self.counter.direction(),
            "agent started"
        );

        'run: while !self.is_stop_requested() {
            let value = self.counter.read();
            let text = value.to_string();

            retry.reset();
            let shown = loop {
                // A stop request abandons an in-flight rendezvous; the value
                // was never acknowledged, so the counter is not stepped.
                let outcome = tokio::select! {
                    outcome = display.render(text.clone()) => outcome,
                    _ = self.stop.cancelled() => break 'run,
                };
                match retry.evaluate(&outcome) {
                    RetryDecision::Proceed => break true,
                    RetryDecision::Retry { .. } if self.is_stop_requested() => break 'run,
                    RetryDecision::Retry { .. } => continue,
                    RetryDecision::Skip if outcome == Err(RenderError::Closed) => {
                        error!(value, "display closed, stopping agent");
                        stop_reason = StopReason::DisplayClosed;
                        self.stop_counting();
                        break 'run;
                    }
                    RetryDecision::Skip => break false,
                }
            };

            if shown {
                renders += 1;
                let next = self.counter.step();
                steps += 1;
                debug!(shown = value, next, "tick");
            } else {
                skipped_steps += 1;
                warn!(value, "value was not displayed, counter left unchanged");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                _ = self.stop.cancelled() => {}
            }
            // Let anything due at this same instant (e.g. the watchdog) run
            // before the flag is checked again.
            tokio::task::yield_now().await;
        }

        controls.disable();
        self.state.send_replace(AgentState::Stopped);

        let summary = RunSummary {
            renders,
            steps,
            skipped_steps,
            final_value: self.counter.read(),
            final_direction: self.counter.direction(),
            stop_reason,
            started_at,
            stopped_at: Utc::now(),
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };
        info!(
            renders,
            steps,
            skipped_steps,
            final_value = summary.final_value,
            elapsed_ms = summary.elapsed_ms,
            "agent stopped"
        );
        Ok(summary)
    }
}
