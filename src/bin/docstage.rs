//! CLI binary for docstage.
//!
//! A thin shim over the library crate that maps CLI flags to `StageConfig`
//! and drives the acquire → stage → convert → deliver flow end to end.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docstage::{
    deliver, Checkpoint, JobContext, SourceMeta, StageConfig, SyntheticProgress,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a document and save the artifact into ./downloads
  docstage convert scan.pdf

  # Against a specific conversion service, custom output directory
  docstage convert scan.pdf --endpoint http://conv:9000/process --out-dir ~/Documents

  # Where did the flow get to? (survives restarts)
  docstage status

  # Re-deliver a completed job's artifact
  docstage fetch --out-dir ~/Documents

  # Abandon the current job and start over
  docstage reset

ENVIRONMENT VARIABLES:
  DOCSTAGE_ENDPOINT    Conversion service URL (default http://localhost:8000/process)
  DOCSTAGE_STATE_DIR   Where staged payloads and the session descriptor live
  DOCSTAGE_OUT_DIR     Where delivered artifacts are saved (default ./downloads)
  DOCSTAGE_TIMEOUT     Remote call timeout in seconds (default 300)
"#;

/// Stage, convert, and deliver documents through a remote conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "docstage",
    version,
    about = "Stage, convert, and deliver documents through a remote conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding staged payloads and the session descriptor.
    #[arg(long, global = true, env = "DOCSTAGE_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSTAGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSTAGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a local file and deliver the artifact.
    Convert {
        /// Path to the file to convert.
        input: PathBuf,

        /// Conversion service endpoint.
        #[arg(long, env = "DOCSTAGE_ENDPOINT", default_value = "http://localhost:8000/process")]
        endpoint: String,

        /// Directory to save the delivered artifact in.
        #[arg(short, long, env = "DOCSTAGE_OUT_DIR", default_value = "downloads")]
        out_dir: PathBuf,

        /// Remote call timeout in seconds.
        #[arg(long, env = "DOCSTAGE_TIMEOUT", default_value_t = 300)]
        timeout: u64,

        /// MIME type to declare for the upload.
        #[arg(long, default_value = "application/pdf")]
        mime: String,

        /// Disable the progress display.
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the current checkpoint derived from persisted state.
    Status,

    /// Re-deliver the artifact of the completed job.
    Fetch {
        /// Directory to save the delivered artifact in.
        #[arg(short, long, env = "DOCSTAGE_OUT_DIR", default_value = "downloads")]
        out_dir: PathBuf,
    },

    /// Abandon the current job (its staged payloads are kept until disposal).
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress display is the user-facing feedback; keep library logs
    // at error level unless verbosity is requested.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert {
            ref input,
            ref endpoint,
            ref out_dir,
            timeout,
            ref mime,
            no_progress,
        } => {
            let ctx = build_context(&cli, Some((endpoint.clone(), timeout)))?;
            run_convert(&cli, &ctx, input, out_dir, mime, no_progress).await
        }
        Command::Status => {
            let ctx = build_context(&cli, None)?;
            run_status(&ctx)
        }
        Command::Fetch { ref out_dir } => {
            let ctx = build_context(&cli, None)?;
            run_fetch(&cli, &ctx, out_dir).await
        }
        Command::Reset => {
            let ctx = build_context(&cli, None)?;
            ctx.reset().context("Failed to clear the session")?;
            if !cli.quiet {
                eprintln!("{} session cleared", green("✔"));
            }
            Ok(())
        }
    }
}

/// Map CLI args to a `JobContext`.
fn build_context(cli: &Cli, remote: Option<(String, u64)>) -> Result<JobContext> {
    let mut builder = StageConfig::builder();
    if let Some(ref dir) = cli.state_dir {
        builder = builder.state_dir(dir.clone());
    }
    if let Some((endpoint, timeout)) = remote {
        builder = builder.endpoint(endpoint).remote_timeout_secs(timeout);
    }
    let config = builder.build().context("Invalid configuration")?;
    JobContext::new(config).context("Failed to initialise the staging context")
}

async fn run_convert(
    cli: &Cli,
    ctx: &JobContext,
    input: &PathBuf,
    out_dir: &PathBuf,
    mime: &str,
    no_progress: bool,
) -> Result<()> {
    let payload = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read '{}'", input.display()))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let meta = SourceMeta {
        name,
        size: payload.len() as u64,
        mime_type: mime.to_string(),
    };

    let show_progress = !cli.quiet && !no_progress;
    let progress = Arc::new(SyntheticProgress::start(
        ctx.config().steps.clone(),
        ctx.config().step_interval,
    ));

    // The progress display runs concurrently with the real call and shares
    // nothing with it beyond the reporter's done flag.
    let ui = show_progress.then(|| {
        let progress = Arc::clone(&progress);
        tokio::spawn(async move {
            let bar = ProgressBar::new(progress.total() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos}/{len}  {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            bar.set_prefix("Converting");
            bar.enable_steady_tick(Duration::from_millis(80));

            loop {
                bar.set_position(progress.current() as u64);
                bar.set_message(progress.current_label().unwrap_or("").to_string());
                if progress.is_done() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            bar.finish_and_clear();
        })
    });

    let outcome = ctx.convert_file(meta, &payload).await;
    progress.finish();
    if let Some(ui) = ui {
        ui.await.ok();
    }

    let result = match outcome {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {}", red("✘"), e.user_message());
            eprintln!("   {}", dim(&format!("next: {:?}", e.next_action())));
            std::process::exit(1);
        }
    };

    let bytes = deliver::fetch_result(ctx, &result.job_id)
        .await
        .context("Failed to read the converted document")?
        .context("Converted document missing after completion")?;
    let path = deliver::save_to(out_dir, &result.suggested_name, &bytes)
        .await
        .context("Failed to save the converted document")?;

    if !cli.quiet {
        eprintln!(
            "{} {}  →  {}",
            green("✔"),
            bold(&result.suggested_name),
            bold(&path.display().to_string()),
        );
    }

    // Let the grace window elapse before exiting so cleanup actually runs.
    deliver::dispose(ctx, &result.job_id).await.ok();
    Ok(())
}

fn run_status(ctx: &JobContext) -> Result<()> {
    let checkpoint = ctx.checkpoint().context("Failed to read session state")?;
    match checkpoint {
        Checkpoint::Acquire => println!("no active job — ready to acquire a file"),
        Checkpoint::Processing => {
            let job = ctx.active_job().context("Failed to read session state")?;
            match job {
                Some(j) => println!(
                    "job {} ({}) in progress — status {:?}",
                    j.id, j.source.name, j.status
                ),
                None => println!("job in progress"),
            }
        }
        Checkpoint::Deliver => println!("conversion complete — artifact ready to fetch"),
    }
    Ok(())
}

async fn run_fetch(cli: &Cli, ctx: &JobContext, out_dir: &PathBuf) -> Result<()> {
    let job = ctx
        .active_job()
        .context("Failed to read session state")?
        .context("No active job. Run `docstage convert` first.")?;

    let bytes = match deliver::fetch_result(ctx, &job.id)
        .await
        .context("Failed to read the converted document")?
    {
        Some(b) => b,
        None => {
            eprintln!(
                "{} no converted document found — run `docstage convert` again",
                red("✘")
            );
            std::process::exit(1);
        }
    };

    let name = job.suggested_output_name(&ctx.config().output_extension);
    let path = deliver::save_to(out_dir, &name, &bytes)
        .await
        .context("Failed to save the converted document")?;

    if !cli.quiet {
        eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
    }

    deliver::dispose(ctx, &job.id).await.ok();
    Ok(())
}
