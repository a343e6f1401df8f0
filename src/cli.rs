use crate::{
    config::{CleanMode, Config, SaveMode},
    engine::{pdf::PdfEngine, render::PopplerRenderer, tesseract::TesseractRecognizer, Recognizer},
    job::{ControlHandle, JobController, JobEvent},
    naming::{sweep_stale_temps, OutputResolver},
    queue::FileQueue,
    report::{export, ReportMeta},
    util::{ensure_dir, format_hms, now_rfc3339, sha256_hex, today},
};
use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "pdf-batch")]
#[command(about = "Batch PDF scanning, OCR and first-page removal with pause/resume/stop")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pdf-batch.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the OCR engine, its language data and the page renderer are installed.
    Doctor {},
    /// Show which files a run would visit and where each output would land.
    Plan {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    Run {
        /// PDF files or directories holding PDFs.
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[command(flatten)]
        operations: OperationArgs,
        #[command(flatten)]
        output: OutputArgs,
        #[arg(long)]
        report_dir: Option<PathBuf>,
        /// Do not read p/r/s commands from stdin.
        #[arg(long)]
        no_interactive: bool,
    },
    /// Remove temporaries left behind by an interrupted run.
    Sweep {
        #[arg(long, required = true, num_args = 1..)]
        dir: Vec<PathBuf>,
    },
}

/// Each flag switches an operation on; unset flags keep the config value.
#[derive(ClapArgs, Debug, Default)]
pub struct OperationArgs {
    #[arg(long)]
    pub scan: bool,
    #[arg(long)]
    pub ignore_first_page_in_scan: bool,
    #[arg(long)]
    pub ocr: bool,
    #[arg(long)]
    pub remove_first_page: bool,
    #[arg(long)]
    pub dpi: Option<u32>,
    #[arg(long)]
    pub lang: Option<String>,
}

#[derive(ClapArgs, Debug, Default)]
pub struct OutputArgs {
    #[arg(long, value_enum)]
    pub save_mode: Option<SaveMode>,
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(long)]
    pub suffix: Option<String>,
    #[arg(long, value_enum)]
    pub clean: Option<CleanMode>,
}

impl OperationArgs {
    fn apply(&self, cfg: &mut Config) {
        let ops = &mut cfg.operations;
        ops.scan_for_missing_text |= self.scan;
        ops.ignore_first_page_in_scan |= self.ignore_first_page_in_scan;
        ops.perform_recognition |= self.ocr;
        ops.remove_first_page |= self.remove_first_page;
        if let Some(dpi) = self.dpi {
            cfg.recognition.dpi = dpi;
        }
        if let Some(lang) = &self.lang {
            cfg.recognition.language = lang.clone();
        }
    }
}

impl OutputArgs {
    fn apply(&self, cfg: &mut Config) {
        let out = &mut cfg.output;
        if let Some(mode) = self.save_mode {
            out.save_mode = mode;
        }
        if let Some(prefix) = &self.prefix {
            out.filename_prefix = prefix.clone();
        }
        if let Some(suffix) = &self.suffix {
            out.filename_suffix = suffix.clone();
        }
        if let Some(clean) = self.clean {
            out.clean_mode = clean;
        }
    }
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = match resolve_config_path(args.config.as_deref())? {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            doctor(&cfg)
        }
        Command::Plan { input, output } => {
            output.apply(&mut cfg);
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            plan(&cfg, input)
        }
        Command::Run {
            input,
            operations,
            output,
            report_dir,
            no_interactive,
        } => {
            operations.apply(&mut cfg);
            output.apply(&mut cfg);
            if let Some(dir) = report_dir {
                cfg.report.dir = dir.display().to_string();
            }
            if *no_interactive {
                cfg.global.interactive = false;
            }
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            run(&cfg, input)
        }
        Command::Sweep { dir } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            sweep(&cfg, dir)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config file does not exist: {}", p.display()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    let default = PathBuf::from("pdf-batch.toml");
    if default.exists() {
        return Ok(Some(default));
    }
    let example = PathBuf::from("pdf-batch.example.toml");
    Ok(example.exists().then_some(example))
}

fn init_logging(
    args: &Args,
    cfg: &Config,
    file_path: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.report.dir).join("pdf-batch.log"))
}

fn engines(cfg: &Config) -> (PdfEngine, TesseractRecognizer) {
    let renderer = PopplerRenderer::new(&cfg.recognition.pdftoppm_exe);
    let recognizer = TesseractRecognizer::new(
        &cfg.recognition.tesseract_exe,
        Some(cfg.recognition.tessdata_dir.clone()),
    );
    (PdfEngine::new(renderer), recognizer)
}

fn doctor(cfg: &Config) -> Result<()> {
    let renderer = PopplerRenderer::new(&cfg.recognition.pdftoppm_exe);
    let (_, recognizer) = engines(cfg);
    let run = cfg.run_config();

    let tesseract = match recognizer.probe(&run.recognition.language) {
        Ok(diag) => serde_json::to_value(diag)?,
        Err(e) => serde_json::json!({
            "exe": cfg.recognition.tesseract_exe,
            "ok": false,
            "error": e.to_string(),
        }),
    };
    let pdftoppm = match renderer.probe() {
        Ok(version) => serde_json::json!({
            "exe": cfg.recognition.pdftoppm_exe,
            "version": version,
            "ok": true,
        }),
        Err(e) => serde_json::json!({
            "exe": cfg.recognition.pdftoppm_exe,
            "ok": false,
            "error": e.to_string(),
        }),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "language": run.recognition.language,
            "dpi": run.recognition.dpi,
            "tesseract": tesseract,
            "pdftoppm": pdftoppm,
        }))?
    );
    Ok(())
}

fn plan(cfg: &Config, inputs: &[PathBuf]) -> Result<()> {
    let queue = FileQueue::from_inputs(inputs)?;
    let resolver = OutputResolver::new(&cfg.output)?;
    let files: Vec<_> = queue
        .iter()
        .map(|input| {
            serde_json::json!({
                "input": input,
                "output": resolver.plan_target(input),
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "save_mode": cfg.output.save_mode,
            "files": files,
        }))?
    );
    Ok(())
}

fn run(cfg: &Config, inputs: &[PathBuf]) -> Result<()> {
    let queue = FileQueue::from_inputs(inputs)?;
    let run_cfg = cfg.run_config();

    let listing: Vec<String> = queue.iter().map(|p| p.display().to_string()).collect();
    let cfg_hash = sha256_hex(cfg.normalized_for_hash().as_bytes());
    let job_id = sha256_hex(format!("{cfg_hash}:{}", listing.join("\n")).as_bytes());
    info!("job_id={job_id} files={}", queue.len());

    let (documents, recognizer) = engines(cfg);
    let tick = Duration::from_millis(cfg.progress.tick_interval_ms.max(50));
    let mut controller = JobController::new(documents, recognizer).with_tick_interval(tick);

    let started = now_rfc3339();
    let events = controller.start(queue, run_cfg)?;

    if cfg.global.interactive {
        spawn_stdin_control(controller.handle());
    }
    for event in events {
        render_event(&event);
    }

    let summary = controller.wait()?;

    let exported = match controller.report() {
        Some(records) => {
            let meta = ReportMeta::new(
                &job_id,
                &started,
                &now_rfc3339(),
                summary.outcome,
                &summary.progress,
            );
            let report = records.clone().finish(meta);
            let exported = export(
                &report,
                Path::new(&cfg.report.dir),
                &cfg.report.filename_stem,
                &today(),
                cfg.report.write_csv,
                cfg.report.write_json,
            )?;
            info!(?exported, "report written");
            Some(exported)
        }
        None => {
            warn!("no records to export");
            None
        }
    };

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "job_id": job_id,
                "outcome": summary.outcome,
                "processed": summary.progress.completed,
                "total": summary.progress.total,
                "failures": summary.failures,
                "elapsed": format_hms(summary.progress.elapsed),
                "report": exported,
            }))?
        );
    }
    Ok(())
}

/// Reads `p`, `r` and `s` lines from stdin. The thread is detached and ends with the process.
fn spawn_stdin_control(handle: ControlHandle) {
    let spawned = std::thread::Builder::new()
        .name("pdf-batch-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let result = match line.trim() {
                    "p" | "pause" => handle.pause(),
                    "r" | "resume" => handle.resume(),
                    "s" | "stop" => handle.stop(),
                    "" => continue,
                    other => {
                        warn!("unknown command {other:?}; use p, r or s");
                        continue;
                    }
                };
                if let Err(e) = result {
                    warn!("{e}");
                }
                if !handle.state().is_active() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("interactive control unavailable: {e}");
    }
}

fn render_event(event: &JobEvent) {
    match event {
        JobEvent::Progress { progress } => {
            let eta = progress
                .estimated_remaining
                .map(format_hms)
                .unwrap_or_else(|| "--:--:--".to_string());
            println!(
                "[{:>3.0}%] {}/{} done, elapsed {}, remaining {}",
                progress.percent(),
                progress.completed,
                progress.total,
                format_hms(progress.elapsed),
                eta
            );
        }
        JobEvent::FileFinished { record, .. } => {
            println!("{}", record.cells().join(" | "));
        }
        JobEvent::PageRecognized { index, page, pages } => {
            debug!(file = index + 1, page, pages, "page recognized");
        }
        JobEvent::Started { .. }
        | JobEvent::FileStarted { .. }
        | JobEvent::Log { .. }
        | JobEvent::Finished { .. } => {}
    }
}

fn sweep(cfg: &Config, dirs: &[PathBuf]) -> Result<()> {
    let mut removed = Vec::new();
    for dir in dirs {
        removed.extend(sweep_stale_temps(dir)?);
        let processed = dir.join(&cfg.output.processed_dir_name);
        if processed.is_dir() {
            removed.extend(sweep_stale_temps(&processed)?);
        }
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "removed": removed }))?
    );
    Ok(())
}
