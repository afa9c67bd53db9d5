//! pgcompare CLI - compare one PostgreSQL schema against many others

mod config;
mod report;

use clap::Parser;
use pgcompare::{Error, Orchestrator, RunEvent, RunOptions};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;

/// Compare the structure of a base PostgreSQL schema against many targets.
#[derive(Debug, Parser)]
#[command(name = "pgcompare", version)]
struct Cli {
    /// Config file (defaults to `.config/pgcompare.styx`, searched upward)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of targets compared at once
    #[arg(long)]
    workers: Option<usize>,

    /// Number of targets handed to the pool at a time
    #[arg(long)]
    batch_size: Option<usize>,

    /// Per-target time limit in seconds, 0 disables it
    #[arg(long)]
    target_timeout_secs: Option<u64>,

    /// How many problem targets to list
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Print every difference under its target
    #[arg(long)]
    details: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, mut options: RunOptions) -> RunOptions {
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            options.batch_size = batch_size;
        }
        match self.target_timeout_secs {
            Some(0) => options.target_timeout = None,
            Some(secs) => options.target_timeout = Some(Duration::from_secs(secs)),
            None => {}
        }
        options
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pgcompare=debug,pgcompare_cli=debug"
    } else {
        "pgcompare=info,pgcompare_cli=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Error> {
    let (config, config_path) = match &cli.config {
        Some(path) => (config::load_file(path)?, path.clone()),
        None => config::load()?,
    };
    tracing::debug!(path = %config_path.display(), "loaded config");

    let (base, targets) = config::endpoints(&config)?;
    let options = cli.apply(config::run_options(&config.run));

    tracing::info!(
        base = %base,
        locator = %base.masked_locator(),
        schema = base.schema(),
        targets = targets.len(),
        "comparing schemas"
    );
    for target in &targets {
        tracing::debug!(
            endpoint = %target,
            locator = %target.masked_locator(),
            schema = target.schema(),
            "target"
        );
    }

    let loader = config::loader(&config.run);

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(log_progress(rx, targets.len()));

    let result = Orchestrator::new(loader)
        .with_options(options)
        .with_events(tx)
        .run(&base, &targets)
        .await;
    // The orchestrator owned the sender, so the progress task ends here.
    let _ = progress.await;
    let report = result?;

    let color = std::io::stdout().is_terminal();
    let renderer = report::Renderer::new(color, cli.top, cli.details);
    print!("{}", renderer.render(&report));

    if report.has_failures() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn log_progress(mut rx: mpsc::UnboundedReceiver<RunEvent>, total: usize) {
    let mut done = 0;
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::BatchStarted {
                index,
                batches,
                size,
            } => {
                tracing::debug!("batch {}/{} started ({} targets)", index + 1, batches, size);
            }
            RunEvent::TargetFinished { .. } => {
                done += 1;
                tracing::debug!("{}/{} targets done", done, total);
            }
            _ => {}
        }
    }
}
