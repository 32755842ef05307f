//! rdb-memaudit - Memory Usage Auditor for Redis Snapshots
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use rdb_memaudit::config::{
    bind_address, validate_input, validate_instance, AuditConfig, CliArgs, Command, EngineArgs,
};
use rdb_memaudit::job::{run_job, JobDispatcher};
use rdb_memaudit::report::{print_header, print_summary, ProgressReporter};
use rdb_memaudit::server;
use rdb_memaudit::sink::{MemorySink, RedisSink, StatsSink};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    match args.command {
        Command::Analyze {
            input,
            instance,
            no_export,
            top,
            engine,
        } => runtime.block_on(analyze(input, instance, no_export, top, &engine, &args.redis, args.quiet)),
        Command::Serve { bind, port, engine } => runtime.block_on(serve(&bind, port, &engine, &args.redis)),
    }
}

/// Run a single job in the foreground
async fn analyze(
    input: PathBuf,
    instance: String,
    no_export: bool,
    top: usize,
    engine: &EngineArgs,
    redis_url: &str,
    quiet: bool,
) -> Result<()> {
    let config = AuditConfig::from_args(engine, redis_url).context("Invalid configuration")?;
    validate_instance(&instance).context("Invalid configuration")?;
    validate_input(&input).context("Invalid configuration")?;

    let sink: Box<dyn StatsSink> = if no_export {
        Box::new(MemorySink::new())
    } else {
        let sink = RedisSink::connect(&config.redis_url)
            .await
            .context("Failed to connect to statistics store")?;
        Box::new(sink)
    };

    if !quiet {
        let destination = if no_export { "terminal" } else { config.redis_url.as_str() };
        print_header(&input.display().to_string(), &instance, destination);
    }

    let progress = (!quiet).then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Counting records...");
    }

    let outcome = run_job(input, instance, &config, sink.as_ref()).await;

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }
    let outcome = outcome.context("Analysis failed")?;

    if !quiet {
        print_summary(&outcome, !no_export, top);
    }

    if let Err(reason) = &outcome.source {
        info!(reason = %reason, "Report covers only the records read before the input failed");
    }

    Ok(())
}

/// Accept jobs over HTTP until interrupted
async fn serve(bind: &str, port: u16, engine: &EngineArgs, redis_url: &str) -> Result<()> {
    let config = AuditConfig::from_args(engine, redis_url).context("Invalid configuration")?;
    let addr = bind_address(bind, port).context("Invalid configuration")?;

    let sink = RedisSink::connect(&config.redis_url)
        .await
        .context("Failed to connect to statistics store")?;
    info!(url = sink.url(), "Connected to statistics store");

    let (dispatcher, jobs) = JobDispatcher::spawn(Arc::new(config), Arc::new(sink));
    server::serve(addr, dispatcher).await.context("Server failed")?;

    // router and dispatcher are dropped, let running jobs finish
    info!("Waiting for running jobs");
    jobs.await.context("Job dispatcher failed")?;
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("rdb_memaudit=debug,warn")
    } else {
        EnvFilter::new("rdb_memaudit=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
