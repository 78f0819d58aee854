mod agent;
mod config;
mod controls;
mod counter;
mod display;
mod retry;
mod signals;
mod summary;
mod watchdog;

use agent::Agent;
use clap::Parser;
use config::CounterConfig;
use controls::ControlPanel;
use counter::{Counter, Direction};
use display::TerminalDisplay;
use signals::SignalHandler;
use std::path::PathBuf;
use std::sync::Arc;
use watchdog::Watchdog;

/// Count in the background, print every value, and take `up`, `down` and
/// `stop` commands on stdin. A watchdog stops the count after a fixed time.
#[derive(Parser, Debug)]
#[command(name = "counter-agent", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "counter.toml")]
    config: PathBuf,

    /// Tick interval in milliseconds (overrides config)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Watchdog deadline in milliseconds (overrides config)
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Run without a watchdog deadline
    #[arg(long)]
    no_watchdog: bool,

    /// Starting value (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    start: Option<i64>,

    /// Initial direction: up or down (overrides config)
    #[arg(long)]
    direction: Option<Direction>,

    /// Max render retries before a step is skipped (overrides config)
    #[arg(long)]
    retries: Option<u32>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Extra logging (every tick, every command)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut CounterConfig) {
        if let Some(tick_ms) = self.tick_ms {
            config.agent.tick_ms = tick_ms;
        }
        if let Some(deadline_ms) = self.deadline_ms {
            config.watchdog.deadline_ms = deadline_ms;
        }
        if self.no_watchdog {
            config.watchdog.enabled = false;
        }
        if let Some(start) = self.start {
            config.agent.start_value = start;
        }
        if let Some(direction) = self.direction {
            config.agent.direction = direction;
        }
        if let Some(retries) = self.retries {
            config.render.max_retries = retries;
        }
    }

    /// File values, then CLI overrides, then validation of the merged result.
    fn resolve_config(&self) -> Result<CounterConfig, config::ConfigError> {
        let mut config = CounterConfig::load(&self.config)?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the displayed values; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    };
    // The stdin reader may be parked in a blocking read that the runtime
    // cannot cancel, so leave without waiting for it.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.resolve_config()?;

    if cli.dry_run {
        println!("Config file: {}", cli.config.display());
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let counter = Arc::new(Counter::new(
        config.agent.start_value,
        config.agent.direction,
    ));
    let agent = Arc::new(
        Agent::new(counter, &config.agent).with_render_retries(config.render.max_retries),
    );
    let panel = Arc::new(ControlPanel::new());
    let (display, display_task) = display::spawn_display(
        TerminalDisplay::new(std::io::stdout()),
        config.render.ack_timeout(),
    );

    let _signals = SignalHandler::install(Arc::clone(&agent));

    let watchdog = if config.watchdog.enabled {
        Some(Watchdog::new(config.watchdog.deadline()).spawn(Arc::clone(&agent)))
    } else {
        tracing::info!("watchdog disabled, counting until stopped");
        None
    };

    let input = {
        let agent = Arc::clone(&agent);
        let panel = Arc::clone(&panel);
        tokio::spawn(async move {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            if let Err(e) = controls::read_commands(stdin, &agent, &panel).await {
                tracing::warn!(error = %e, "failed to read control input");
            }
        })
    };

    let summary = agent.run(&display, panel.as_ref()).await?;

    drop(display);
    if let Err(e) = display_task.await {
        tracing::warn!(error = %e, "display task failed");
    }
    if let Some(watchdog) = watchdog {
        match watchdog.await {
            Ok(outcome) => tracing::debug!(?outcome, "watchdog finished"),
            Err(e) => tracing::warn!(error = %e, "watchdog task failed"),
        }
    }
    input.abort();

    if cli.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{}", summary.line());
    }
    Ok(())
}
