use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use abacus::config::Config;
use abacus::core::{ExpressionId, ExpressionStatus, ExpressionView};
use abacus::orchestration::{Orchestrator, WorkerPool};
use abacus::server::{self, HttpTaskSource};
use abacus::{alog, alog_error, Error, Result};

const EVAL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Abacus - distributed arithmetic expression evaluator
#[derive(Parser, Debug)]
#[command(name = "abacus")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    \
    ABACUS_DEBUG=1            Enable debug logging (alternative to --debug)\n    \
    ABACUS_LOG=<level>        Log level: error, warn, info, debug or trace\n    \
    PORT                      Orchestrator port\n    \
    TIME_ADDITION_MS          Expected duration of '+' tasks\n    \
    TIME_SUBTRACTION_MS       Expected duration of '-' tasks\n    \
    TIME_MULTIPLICATIONS_MS   Expected duration of '*' tasks\n    \
    TIME_DIVISIONS_MS         Expected duration of '/' tasks\n    \
    COMPUTING_POWER           Workers per agent\n    \
    ORCHESTRATOR_URL          Orchestrator base URL for agents\n    \
    TASK_LEASE_MS             Requeue tasks not answered within this time")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.abacus/<command>.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the orchestrator HTTP server
    Serve {
        /// Listen address (overrides config and PORT)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Run a worker agent against a remote orchestrator
    Agent {
        /// Orchestrator base URL (overrides config and ORCHESTRATOR_URL)
        #[arg(long)]
        url: Option<String>,

        /// Number of concurrent workers (overrides COMPUTING_POWER)
        #[arg(short = 'n', long)]
        workers: Option<usize>,
    },

    /// Evaluate one expression with an in-process orchestrator and workers
    Eval {
        /// The arithmetic expression, e.g. "(2+2)*2"
        expression: String,

        /// Number of concurrent workers (overrides COMPUTING_POWER)
        #[arg(short = 'n', long)]
        workers: Option<usize>,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Print the final expression record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to ~/.abacus/abacus.toml
        #[arg(long)]
        init: bool,
    },
}

impl Command {
    fn log_name(&self) -> &'static str {
        match self {
            Command::Serve { .. } => "orchestrator",
            Command::Agent { .. } => "agent",
            Command::Eval { .. } => "eval",
            Command::Config { .. } => "abacus",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    abacus::log::init_with_debug(cli.command.log_name(), cli.debug);
    if abacus::log::is_debug() {
        if let Some(path) = abacus::log::log_path() {
            eprintln!("Debug log: {}", path.display());
        }
    }

    let config = Config::load()?;
    let result = match cli.command {
        Command::Serve { addr } => run_serve(config, addr),
        Command::Agent { url, workers } => run_agent(config, url, workers),
        Command::Eval {
            expression,
            workers,
            timeout_secs,
            json,
        } => run_eval(
            config,
            &expression,
            workers,
            Duration::from_secs(timeout_secs),
            json,
        ),
        Command::Config { init } => run_config(config, init),
    };

    if let Err(e) = &result {
        alog_error!("Command failed: {}", e);
    }
    result
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            alog!("Interrupt received, shutting down");
            token.cancel();
        }
    });
}

fn run_serve(config: Config, addr: Option<String>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.server.addr.clone());
    let orchestrator = Arc::new(Orchestrator::from_config(&config));
    alog!(
        "Starting orchestrator on {} (timings {:?}, lease {:?})",
        addr,
        config.timings,
        orchestrator.task_lease()
    );
    println!("Orchestrator listening on {}", addr);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        server::serve(&addr, orchestrator, cancel).await
    })
}

fn run_agent(config: Config, url: Option<String>, workers: Option<usize>) -> Result<()> {
    let url = url.unwrap_or_else(|| config.worker.orchestrator_url.clone());
    let workers = workers.unwrap_or(config.worker.computing_power);
    let source = Arc::new(HttpTaskSource::new(&url));
    alog!("Starting agent with {} worker(s) against {}", workers, source.base_url());
    println!("Agent running {} worker(s) against {}", workers, source.base_url());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        let pool = WorkerPool::spawn(source, workers, config.worker.poll_interval(), cancel);
        pool.join().await
    })
}

fn run_eval(
    config: Config,
    expression: &str,
    workers: Option<usize>,
    timeout: Duration,
    json: bool,
) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(&config));
    let id = orchestrator.submit(expression)?;
    let workers = workers.unwrap_or(config.worker.computing_power);

    let rt = tokio::runtime::Runtime::new()?;
    let view = rt.block_on(async {
        let pool = WorkerPool::spawn(
            Arc::clone(&orchestrator),
            workers,
            EVAL_POLL_INTERVAL,
            CancellationToken::new(),
        );
        let outcome =
            match tokio::time::timeout(timeout, wait_for_completion(&orchestrator, id)).await {
                Ok(view) => view,
                Err(_) => {
                    if let Ok(stats) = orchestrator.stats() {
                        alog!("Eval timed out: {:?}", stats);
                    }
                    Err(Error::Timeout(timeout))
                }
            };
        pool.shutdown().await.and(outcome)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else if let Some(result) = view.result {
        println!("{} = {}", view.expression, result);
    }
    Ok(())
}

async fn wait_for_completion(orchestrator: &Orchestrator, id: ExpressionId) -> Result<ExpressionView> {
    loop {
        let view = orchestrator.get_expression(id)?;
        if view.status == ExpressionStatus::Completed {
            return Ok(view);
        }
        tokio::time::sleep(EVAL_POLL_INTERVAL).await;
    }
}

fn run_config(config: Config, init: bool) -> Result<()> {
    if init {
        let path = config.save()?;
        println!("Configuration written to {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
