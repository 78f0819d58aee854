/// Deadline watchdog for the counter agent.
///
/// Runs alongside the agent. Sleeps once for `deadline`, then forces the
/// agent to stop. Single shot: no retry, no repeat. If the agent stops on
/// its own first, the watchdog has nothing left to do and returns early.
use crate::agent::Agent;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// The deadline passed and the watchdog called `stop_counting()`.
    Fired,
    /// The agent was stopped before the deadline.
    AgentStopped,
}

pub struct Watchdog {
    deadline: Duration,
}

impl Watchdog {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub async fn monitor(&self, agent: &Agent) -> WatchdogOutcome {
        let stop = agent.stop_token();
        tokio::select! {
            _ = tokio::time::sleep(self.deadline) => {
                tracing::info!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    "watchdog deadline reached, stopping agent"
                );
                agent.stop_counting();
                WatchdogOutcome::Fired
            }
            _ = stop.cancelled() => {
                tracing::debug!("agent stopped before watchdog deadline");
                WatchdogOutcome::AgentStopped
            }
        }
    }

    /// Run `monitor` on its own task.
    pub fn spawn(self, agent: Arc<Agent>) -> JoinHandle<WatchdogOutcome> {
        tokio::spawn(async move { self.monitor(&agent).await })
    }
}
