/// Run summary: what the agent did between start and stop.
///
/// Printed once at exit, either as a single human-readable line or as
/// pretty JSON (`--json`).
use crate::counter::Direction;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why the agent loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop_counting()` was called: by a command, a signal or the watchdog.
    Requested,
    /// The display task went away and the agent stopped itself.
    DisplayClosed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Values the display acknowledged.
    pub renders: u64,
    /// Counter steps applied.
    pub steps: u64,
    /// Iterations where every render attempt failed and the step was skipped.
    pub skipped_steps: u64,
    pub final_value: i64,
    pub final_direction: Direction,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// One-line description for terminal output.
    pub fn line(&self) -> String {
        let reason = match self.stop_reason {
            StopReason::Requested => "stopped",
            StopReason::DisplayClosed => "display closed",
        };
        let mut line = format!(
            "{}: final value {} ({}), {} renders, {} steps in {}ms",
            reason,
            self.final_value,
            self.final_direction,
            self.renders,
            self.steps,
            self.elapsed_ms
        );
        if self.skipped_steps > 0 {
            line.push_str(&format!(", {} skipped", self.skipped_steps));
        }
        line
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
