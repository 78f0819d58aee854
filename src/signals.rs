/// Signal handling for graceful shutdown.
///
/// First Ctrl-C (or SIGTERM): ask the agent to stop; it finishes the
/// current tick and disables the controls.
/// Second Ctrl-C (within 3s): exit immediately with status 130.
use crate::agent::Agent;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const DOUBLE_INTERRUPT_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Request a cooperative stop.
    Stop,
    /// Give up on the agent and exit now.
    Exit,
}

/// Tracks interrupts to detect a double Ctrl-C.
#[derive(Debug)]
pub struct InterruptTracker {
    window: Duration,
    last: Option<Instant>,
}

impl InterruptTracker {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn on_interrupt(&mut self, now: Instant) -> InterruptAction {
        let action = match self.last {
            Some(prev) if now.saturating_duration_since(prev) <= self.window => {
                InterruptAction::Exit
            }
            _ => InterruptAction::Stop,
        };
        self.last = Some(now);
        action
    }
}

pub struct SignalHandler;

impl SignalHandler {
    /// Spawn the signal listener. It exits once the agent has stopped.
    pub fn install(agent: Arc<Agent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tracker = InterruptTracker::new(DOUBLE_INTERRUPT_WINDOW);
            loop {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                            return;
                        }
                        match tracker.on_interrupt(Instant::now()) {
                            InterruptAction::Stop => {
                                tracing::info!("interrupt received, stopping agent (Ctrl-C again to exit now)");
                                agent.stop_counting();
                            }
                            InterruptAction::Exit => {
                                tracing::warn!("second interrupt, exiting immediately");
                                std::process::exit(130);
                            }
                        }
                    }
                    _ = terminate() => {
                        tracing::info!("SIGTERM received, stopping agent");
                        agent.stop_counting();
                        return;
                    }
                    _ = agent.stopped() => return,
                }
            }
        })
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_interrupt_stops() {
        let mut tracker = InterruptTracker::new(Duration::from_secs(3));
        assert_eq!(tracker.on_interrupt(Instant::now()), InterruptAction::Stop);
    }

    #[test]
    fn test_second_interrupt_within_window_exits() {
        let mut tracker = InterruptTracker::new(Duration::from_secs(3));
        let t0 = Instant::now();
        assert_eq!(tracker.on_interrupt(t0), InterruptAction::Stop);
        assert_eq!(
            tracker.on_interrupt(t0 + Duration::from_secs(2)),
            InterruptAction::Exit
        );
    }

    #[test]
    fn test_second_interrupt_after_window_stops_again() {
        let mut tracker = InterruptTracker::new(Duration::from_secs(3));
        let t0 = Instant::now();
        tracker.on_interrupt(t0);
        assert_eq!(
            tracker.on_interrupt(t0 + Duration::from_secs(4)),
            InterruptAction::Stop
        );
        // The window restarts from the latest interrupt.
        assert_eq!(
            tracker.on_interrupt(t0 + Duration::from_secs(5)),
            InterruptAction::Exit
        );
    }
}
