use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use redraft::{
    AnthropicChat, AnthropicClient, AnthropicConfig, FileDropChat, GenerativeSession, HtmlEditor,
    PipelineConfig, extract_body, package_body, process_batch, read_markup,
};

#[derive(Parser)]
#[command(name = "redraft")]
#[command(author, version, about = "Document markup normalization pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Anthropic Messages API (needs ANTHROPIC_API_KEY)
    Anthropic,
    /// Write prompt.txt into the staging area and wait for reply.html
    FileDrop,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert documents, one at a time
    Process {
        /// Documents or directories to process
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Generative service to submit to
        #[arg(long, value_enum, default_value = "anthropic")]
        backend: Backend,

        /// Seconds to wait for a complete, stable answer
        #[arg(long, default_value = "600")]
        wait_secs: u64,

        /// Identical observations required before accepting an answer
        #[arg(long, default_value = "3")]
        stable_checks: u32,

        /// Milliseconds between observations
        #[arg(long, default_value = "1000")]
        poll_ms: u64,

        /// Remove staging directories after each document
        #[arg(long)]
        discard_staging: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write the submission for one exported HTML file without sending it
    Prepare {
        /// Exported HTML file
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the packaged submission
        #[arg(short, long)]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            inputs,
            backend,
            wait_secs,
            stable_checks,
            poll_ms,
            discard_staging,
            verbose,
        } => {
            setup_logging(verbose);
            let mut config = PipelineConfig::default();
            config.stage1.stabilizer.deadline = Duration::from_secs(wait_secs);
            config.stage1.stabilizer.stable_checks = stable_checks.max(1);
            config.stage1.stabilizer.poll_interval = Duration::from_millis(poll_ms.max(1));
            config.staging.keep_staging = !discard_staging;

            match backend {
                Backend::Anthropic => {
                    let client = AnthropicClient::new(AnthropicConfig::from_env()?);
                    run_batch(AnthropicChat::new(client), &inputs, &config).await
                }
                Backend::FileDrop => run_batch(FileDropChat::new(), &inputs, &config).await,
            }
        }
        Commands::Prepare {
            input,
            output,
            verbose,
        } => {
            setup_logging(verbose);
            prepare_submission(&input, &output)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn run_batch<C: GenerativeSession>(
    mut chat: C,
    inputs: &[PathBuf],
    config: &PipelineConfig,
) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current document");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let mut editor = HtmlEditor::new();
    let summary = process_batch(&mut editor, &mut chat, inputs, config, &cancel).await?;

    for outcome in &summary.processed {
        info!("{:?} -> {:?}", outcome.source, outcome.output);
        for diagnostic in &outcome.diagnostics {
            warn!("  {}", diagnostic);
        }
    }

    if !summary.failures.is_empty() {
        let report = summary
            .report
            .map(|p| format!(" (see {:?})", p))
            .unwrap_or_default();
        anyhow::bail!("{} document(s) failed{}", summary.failures.len(), report);
    }
    Ok(())
}

fn prepare_submission(input: &Path, output: &Path) -> Result<()> {
    info!("Preparing submission from {:?}", input);
    let markup = read_markup(input)?;

    let body = extract_body(&markup);
    if let Some(d) = &body.diagnostic {
        warn!("Sanitizer: {}", d);
    }

    let target_dir = output.parent().unwrap_or(Path::new("."));
    let assets_dir = input.parent().unwrap_or(Path::new("."));
    let packaged = package_body(&body.value, target_dir, assets_dir);
    if let Some(d) = &packaged.diagnostic {
        warn!("Assets: {}", d);
    }

    std::fs::write(output, &packaged.value)
        .with_context(|| format!("Failed to write submission: {:?}", output))?;
    info!(
        "Wrote {} chars to {:?}",
        packaged.value.chars().count(),
        output
    );

    Ok(())
}
