/// Control input: the increment/decrement/stop commands and the one-shot
/// disable notification the agent sends when it stops.
use crate::agent::Agent;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Increment,
    Decrement,
    Stop,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "+" | "inc" | "increment" => Ok(Command::Increment),
            "down" | "-" | "dec" | "decrement" => Ok(Command::Decrement),
            "stop" | "q" | "quit" => Ok(Command::Stop),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

/// Fire-and-forget: forward a command to the agent.
pub fn dispatch(agent: &Agent, command: Command) {
    tracing::debug!(?command, "control command");
    match command {
        Command::Increment => agent.increased_timer(),
        Command::Decrement => agent.decreased_timer(),
        Command::Stop => {
            agent.stop_counting();
        }
    }
}

/// Receiver of the agent's "disable all controls" notification.
pub trait Controls: Send + Sync {
    fn disable(&self);
}

/// Control panel backed by a cancellation token. Once disabled, no further
/// commands are forwarded.
#[derive(Debug, Default)]
pub struct ControlPanel {
    disabled: CancellationToken,
    disable_count: AtomicU32,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled.is_cancelled()
    }

    /// Resolves once the panel has been disabled.
    pub async fn disabled(&self) {
        self.disabled.cancelled().await
    }

    /// How many disable notifications were received.
    #[allow(dead_code)]
    pub fn disable_count(&self) -> u32 {
        self.disable_count.load(Ordering::Acquire)
    }
}

impl Controls for ControlPanel {
    fn disable(&self) {
        let previous = self.disable_count.fetch_add(1, Ordering::AcqRel);
        if previous > 0 {
            tracing::warn!(count = previous + 1, "controls disabled more than once");
        }
        self.disabled.cancel();
        tracing::info!("controls disabled");
    }
}

/// Read one command per line and forward it to the agent.
///
/// Returns at EOF or as soon as the panel is disabled. Blank lines are
/// skipped; unknown commands are logged and ignored.
pub async fn read_commands<R>(reader: R, agent: &Agent, panel: &ControlPanel) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = panel.disabled() => break,
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            tracing::debug!("control input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) if panel.is_enabled() => dispatch(agent, command),
            Ok(command) => tracing::debug!(?command, "controls disabled, ignoring command"),
            Err(e) => tracing::warn!(input = %line.trim(), "{e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::counter::{Counter, Direction};
    use std::sync::Arc;

    fn agent() -> Agent {
        Agent::new(Arc::new(Counter::default()), &AgentConfig::default())
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("up".parse::<Command>().unwrap(), Command::Increment);
        assert_eq!("+".parse::<Command>().unwrap(), Command::Increment);
        assert_eq!("Down".parse::<Command>().unwrap(), Command::Decrement);
        assert_eq!("dec".parse::<Command>().unwrap(), Command::Decrement);
        assert_eq!(" STOP ".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("q".parse::<Command>().unwrap(), Command::Stop);
        assert!("faster".parse::<Command>().is_err());
    }

    #[test]
    fn test_dispatch_maps_to_agent() {
        let agent = agent();
        dispatch(&agent, Command::Decrement);
        assert_eq!(agent.counter().direction(), Direction::Down);
        dispatch(&agent, Command::Increment);
        assert_eq!(agent.counter().direction(), Direction::Up);
        assert!(!agent.is_stop_requested());
        dispatch(&agent, Command::Stop);
        assert!(agent.is_stop_requested());
    }

    #[test]
    fn test_panel_disable_is_observable() {
        let panel = ControlPanel::new();
        assert!(panel.is_enabled());
        panel.disable();
        assert!(!panel.is_enabled());
        assert_eq!(panel.disable_count(), 1);
    }

    #[tokio::test]
    async fn test_read_commands_dispatches_until_eof() {
        let agent = agent();
        let panel = ControlPanel::new();
        let input: &[u8] = b"down\n\nbogus\nstop\n";

        read_commands(input, &agent, &panel).await.unwrap();

        assert_eq!(agent.counter().direction(), Direction::Down);
        assert!(agent.is_stop_requested());
    }

    #[tokio::test]
    async fn test_read_commands_ignores_input_after_disable() {
        let agent = agent();
        let panel = ControlPanel::new();
        panel.disable();
        let input: &[u8] = b"down\nstop\n";

        read_commands(input, &agent, &panel).await.unwrap();

        assert_eq!(agent.counter().direction(), Direction::Up);
        assert!(!agent.is_stop_requested());
    }

    #[tokio::test]
    async fn test_read_commands_returns_when_disabled_while_waiting() {
        let agent = agent();
        let panel = Arc::new(ControlPanel::new());
        // A reader that never yields a line.
        let (_keep_open, rx) = tokio::io::duplex(64);
        let reader = tokio::io::BufReader::new(rx);

        let waiter = Arc::clone(&panel);
        let disable = tokio::spawn(async move {
            tokio::task::yield_now().await;
            waiter.disable();
        });

        read_commands(reader, &agent, &panel).await.unwrap();
        disable.await.unwrap();
        assert!(!panel.is_enabled());
    }
}
