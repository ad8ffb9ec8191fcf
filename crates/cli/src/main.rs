mod args;
mod exit_error;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asvo_core::message::should_colorize;
use asvo_core::{
    load_config, parse_submission_file, validate_config, write_error_report, AsvoConnector,
    DownloadTarget, JobOrchestrator, OrchestratorConfig, OrchestratorError, RunMode,
    SanitizedConfig,
};

use args::{Args, Selected};
use exit_error::{exit_code, ExitError};

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(args.verbose);

    let interrupt = async {
        // No handler installed: never interrupt
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let Some(outcome) = interruptible(run(args), interrupt).await else {
        println!("Interrupted! Exiting...");
        std::process::exit(1);
    };

    if let Err(e) = outcome {
        debug!("Exiting with error: {:?}", e);
        let message = e.to_string();
        if !message.is_empty() {
            println!("{}", message);
        }
        std::process::exit(exit_code(&e));
    }

    println!("mwa_client finished successfully");
}

/// Run `work` unless `interrupt` completes first.
async fn interruptible<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        output = work => Some(output),
        () = interrupt => None,
    }
}

/// Diagnostics go to stderr; stdout belongs to the status output.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(args: Args) -> Result<()> {
    let selected = args.selected()?;
    let output_dir = args.output_dir()?;

    let config = load_config(args.config.as_deref()).map_err(OrchestratorError::from)?;
    validate_config(&config).map_err(OrchestratorError::from)?;
    debug!("Configuration: {:?}", SanitizedConfig::from(&config));

    let mode = match selected {
        Selected::Full | Selected::SubmitOnly => {
            let csv = args
                .csv
                .as_deref()
                .ok_or_else(|| ExitError::new(1, "Error: csvfile not specified"))?;
            let requests = parse_submission_file(csv).map_err(OrchestratorError::from)?;
            info!("Read {} job(s) from {}", requests.len(), csv.display());
            if selected == Selected::Full {
                RunMode::Full { requests }
            } else {
                RunMode::SubmitOnly { requests }
            }
        }
        Selected::ListOnly => RunMode::ListOnly,
        Selected::DownloadOnly(job_id) => RunMode::DownloadOnly {
            target: DownloadTarget::from_id(job_id),
        },
        Selected::Cancel(job_id) => RunMode::Cancel { job_id },
    };

    let orchestrator_config = OrchestratorConfig {
        output_dir,
        verbose: args.verbose,
        colorize: should_colorize(),
        ..OrchestratorConfig::from(&config)
    };
    let orchestrator =
        JobOrchestrator::new(orchestrator_config, Arc::new(AsvoConnector::new(config)));

    let report = orchestrator.run(mode, std::io::stdout()).await?;

    if let Some(path) = &args.error_file {
        write_error_report(path, &report.results)
            .with_context(|| format!("Error: failed to write error file {}", path.display()))?;
    }

    if !report.is_success() {
        println!("There were errors:");
        for result in &report.results {
            println!("{}", result.rendered);
        }
        return Err(ExitError::new(report.exit_code(), "").into());
    }

    Ok(())
}
