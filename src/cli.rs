use crate::backend::BackendClient;
use crate::error::CoreError;
use crate::model::{RunConfig, RunEvent, RunHandle, ScenarioChange};
use crate::orchestrator::{
    export_json, process_run_completion, progress, ActiveRuns, Page, PollSettings, RunOrchestrator,
};
use crate::scenario::ScenarioEngine;
use crate::text_summary::build_comparison_summary;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
    Silent,
}

/// Mode-aware front for the output writer.
struct Output {
    tx: mpsc::UnboundedSender<OutputLine>,
    mode: OutputMode,
}

impl Output {
    /// Progress and status lines; text mode only.
    fn status(&self, msg: impl Into<String>) {
        if self.mode == OutputMode::Text {
            let _ = self.tx.send(OutputLine::Stderr(msg.into()));
        }
    }

    /// Final result lines; suppressed in silent mode.
    fn result(&self, line: impl Into<String>) {
        if self.mode != OutputMode::Silent {
            let _ = self.tx.send(OutputLine::Stdout(line.into()));
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "cinesafe",
    version,
    about = "Drive CineSafe script analysis runs and compare what-if scenarios"
)]
pub struct Cli {
    /// Base URL of the analysis backend API
    #[arg(
        long,
        global = true,
        env = "CINESAFE_API_BASE",
        default_value = "http://localhost:8000/api/v1"
    )]
    pub api_base: String,

    /// Print JSON result and exit
    #[arg(long, global = true)]
    pub json: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long, global = true)]
    pub silent: bool,

    /// Delay between result polls
    #[arg(long, global = true, default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// Delay between progress estimate ticks
    #[arg(long, global = true, default_value = "500ms")]
    pub progress_interval: humantime::Duration,

    /// Poll attempts before a run is reported as timed out
    #[arg(long, global = true, default_value_t = 240)]
    pub max_attempts: u32,

    /// Timeout for a single HTTP request
    #[arg(long, global = true, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// Export the final result as JSON
    #[arg(long, global = true)]
    pub export_json: Option<PathBuf>,

    /// Log level for diagnostics on stderr (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Upload a script, start an analysis run and wait for its result
    Analyze {
        /// Script file to upload (PDF, FDX, TXT, ...)
        file: PathBuf,
    },
    /// Wait for an already-started run to finish
    Watch {
        run_id: String,
    },
    /// Compare a what-if scenario against a completed run
    Whatif {
        run_id: String,

        /// Preset scenario: budget_cut_20, accelerate_timeline or max_safety
        #[arg(long, conflicts_with = "changes")]
        preset: Option<String>,

        /// Custom change as SCENE:FIELD=VALUE (repeatable); VALUE is parsed as JSON when possible
        #[arg(long = "change", value_name = "SCENE:FIELD=VALUE", value_parser = parse_change)]
        changes: Vec<ScenarioChange>,
    },
    /// Generate the PDF report for a completed run
    Report {
        run_id: String,
    },
}

/// Parse `SCENE:FIELD=VALUE` into a change.
fn parse_change(s: &str) -> std::result::Result<ScenarioChange, String> {
    let (target, raw_value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SCENE:FIELD=VALUE, got '{s}'"))?;
    let (scene_id, field) = target
        .split_once(':')
        .ok_or_else(|| format!("expected SCENE:FIELD before '=', got '{target}'"))?;
    let (scene_id, field) = (scene_id.trim(), field.trim());
    if scene_id.is_empty() || field.is_empty() {
        return Err(format!("scene and field must not be empty in '{s}'"));
    }
    let new_value = serde_json::from_str(raw_value.trim())
        .unwrap_or_else(|_| serde_json::Value::String(raw_value.trim().to_string()));
    Ok(ScenarioChange {
        scene_id: scene_id.to_string(),
        field: field.to_string(),
        new_value,
    })
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        api_base: args.api_base.clone(),
        poll_interval: Duration::from(args.poll_interval),
        progress_interval: Duration::from(args.progress_interval),
        max_attempts: args.max_attempts,
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("cinesafe-cli/{}", env!("CARGO_PKG_VERSION")),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }
    crate::logging::init(&args.log_level);

    let cfg = build_config(&args);
    let client = Arc::new(BackendClient::new(&cfg).context("invalid backend configuration")?);

    let mode = if args.silent {
        OutputMode::Silent
    } else if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let (out_tx, out_handle) = spawn_output_writer();
    let out = Output { tx: out_tx, mode };

    let res = match args.command.clone() {
        Command::Analyze { file } => run_analyze(&args, &cfg, client, &out, &file).await,
        Command::Watch { run_id } => {
            watch_run(&args, &cfg, client, &out, RunHandle::new(run_id)).await
        }
        Command::Whatif {
            run_id,
            preset,
            changes,
        } => run_whatif(&args, client, &out, &run_id, preset.as_deref(), changes).await,
        Command::Report { run_id } => run_report(client, &out, &run_id).await,
    };

    drop(out);
    let _ = out_handle.await;
    res
}

async fn run_analyze(
    args: &Cli,
    cfg: &RunConfig,
    client: Arc<BackendClient>,
    out: &Output,
    file: &Path,
) -> Result<()> {
    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("script")
        .to_string();

    out.status(format!("Uploading {file_name}…"));
    let upload = client
        .upload_script(&file_name, contents)
        .await
        .context("upload failed")?;
    out.status(format!("Uploaded as document {}", upload.document_id));

    let started = client
        .start_run(&upload.document_id)
        .await
        .context("analysis start failed")?;
    out.status(format!("Started run {}", started.run_id));

    watch_run(args, cfg, client, out, RunHandle::new(started.run_id)).await
}

/// Orchestrate one run to its terminal event, rendering progress on the way.
async fn watch_run(
    args: &Cli,
    cfg: &RunConfig,
    client: Arc<BackendClient>,
    out: &Output,
    handle: RunHandle,
) -> Result<()> {
    let registry = ActiveRuns::default();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let mut task = RunOrchestrator::start(
        handle.clone(),
        client,
        PollSettings::from_config(cfg),
        &registry,
        event_tx,
    )?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last_step: Option<&'static str> = None;
    let mut terminal: Option<RunEvent> = None;

    loop {
        tokio::select! {
            ev = event_rx.recv() => match ev {
                Some(RunEvent::Progress { percent }) => {
                    let step = progress::step_label(percent);
                    if last_step != Some(step) {
                        out.status(format!("[{percent:>3.0}%] {step}"));
                        last_step = Some(step);
                    }
                }
                Some(RunEvent::Info(info)) => tracing::debug!("{}", info.to_message()),
                Some(ev) if ev.is_terminal() => terminal = Some(ev),
                Some(_) => {}
                None => break,
            },
            _ = &mut ctrl_c => {
                out.status("Interrupted, abandoning run…");
                let run_id = task.run_id().to_string();
                task.abandon().await;
                return Err(anyhow::anyhow!("run {run_id} abandoned before completion"));
            }
        }
    }
    let _ = task.wait().await;

    match terminal {
        Some(RunEvent::Succeeded { result, attempts }) => {
            out.status(format!(
                "Run {} completed after {attempts} poll attempt(s)",
                handle.run_id
            ));
            let processed =
                process_run_completion(&handle, args.export_json.as_deref(), *result)
                    .context("post-run processing failed")?;
            for msg in &processed.export_messages {
                out.status(msg.clone());
            }
            if processed.pages == [Page::Home] {
                out.status("Result holds no scenes; analysis views stay locked");
            }
            if out.mode == OutputMode::Text {
                for line in processed.summary.lines {
                    out.result(line);
                }
            } else if let Some(result) = processed.analysis.current() {
                out.result(serde_json::to_string_pretty(result)?);
            }
            Ok(())
        }
        Some(RunEvent::TimedOut { attempts }) => {
            Err(anyhow::Error::new(CoreError::Timeout { attempts }).context(format!(
                "run {} is still unresolved; resubmit the script to retry",
                handle.run_id
            )))
        }
        Some(RunEvent::Failed { error }) => Err(anyhow::Error::new(error)
            .context(format!("run {} failed while polling", handle.run_id))),
        _ => Err(anyhow::anyhow!(
            "run {} ended without a terminal event",
            handle.run_id
        )),
    }
}

async fn run_whatif(
    args: &Cli,
    client: Arc<BackendClient>,
    out: &Output,
    run_id: &str,
    preset: Option<&str>,
    changes: Vec<ScenarioChange>,
) -> Result<()> {
    let label = match preset {
        Some(name) => name.to_string(),
        None => format!("{} custom change(s)", changes.len()),
    };
    let engine = ScenarioEngine::new(client);
    // Parsing and validation happen once, inside the engine.
    let request = async {
        match preset {
            Some(name) => engine.run_preset(run_id, name).await,
            None => engine.run_custom(run_id, changes).await,
        }
    };

    out.status(format!("Running scenario {label} against run {run_id}…"));
    // Dropping the request future cancels the in-flight call.
    let comparison = tokio::select! {
        res = request => res.context("what-if analysis failed")?,
        _ = tokio::signal::ctrl_c() => {
            return Err(anyhow::anyhow!("what-if request cancelled"));
        }
    };

    if let Some(path) = args.export_json.as_deref() {
        export_json(path, &comparison)?;
        out.status(format!("Exported JSON: {}", path.display()));
    }
    if out.mode == OutputMode::Text {
        for line in build_comparison_summary(&label, &comparison).lines {
            out.result(line);
        }
    } else {
        out.result(serde_json::to_string_pretty(&comparison)?);
    }
    Ok(())
}

async fn run_report(client: Arc<BackendClient>, out: &Output, run_id: &str) -> Result<()> {
    out.status(format!("Generating report for run {run_id}…"));
    let report = client
        .generate_report(run_id)
        .await
        .context("report generation failed")?;

    if out.mode == OutputMode::Text {
        out.result(format!("Report: {} ({})", report.report_id, report.status));
        if let Some(at) = report.generated_at.as_deref() {
            out.result(format!("Generated at: {at}"));
        }
        if let Some(size) = report.file_size_mb {
            out.result(format!("Size: {size:.2} MB"));
        }
        if let Some(url) = report.download_url.as_deref() {
            out.result(format!("Download: {url}"));
        }
    } else {
        out.result(serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
