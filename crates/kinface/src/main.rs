use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kinface_core::{
    CaptureOutcome, EnrollmentStore, ProcessorKind, ReferenceProcessors, ReloadSummary, Session, SessionError,
    SessionOptions,
};
use kinface_sensor::{OperatorAction, ReplayScript};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod engine;

use config::Config;
use display::{FrameSink, NullSink, PngSink};
use engine::{EngineError, EngineHandle};

#[derive(Parser)]
#[command(name = "kinface", about = "Face tracking and enrollment demo")]
struct Cli {
    /// Enrollment store directory (overrides KINFACE_STORE_DIR)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted tracking session through the pipeline
    Run {
        /// Replay manifest (TOML)
        script: PathBuf,
        /// Recognition processor to start with (feature-model, appearance)
        #[arg(short, long)]
        processor: Option<ProcessorKind>,
        /// Label for the first enrollment
        #[arg(short, long)]
        label: Option<String>,
        /// Directory annotated frames are written to
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Only arm a capture when the last frame had a ready face
        #[arg(long)]
        gate_on_ready: bool,
        /// Do not write annotated frames
        #[arg(long)]
        no_frames: bool,
    },
    /// List enrolled records for a processor
    List {
        #[arg(short, long)]
        processor: Option<ProcessorKind>,
    },
    /// Show configuration and enrollment counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.store_dir {
        config.store_dir = dir;
    }

    match cli.command {
        Commands::Run {
            script,
            processor,
            label,
            output_dir,
            gate_on_ready,
            no_frames,
        } => {
            if let Some(kind) = processor {
                config.processor = kind;
            }
            if let Some(label) = label {
                config.initial_label = label;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            config.gate_on_ready |= gate_on_ready;
            run_replay(config, &script, !no_frames).await?;
        }
        Commands::List { processor } => {
            let kind = processor.unwrap_or(config.processor);
            list_records(&config, kind)?;
        }
        Commands::Status => {
            print_status(&config)?;
        }
    }

    Ok(())
}

async fn run_replay(config: Config, script: &Path, write_frames: bool) -> Result<()> {
    let replay = ReplayScript::load(script)
        .with_context(|| format!("loading replay script {}", script.display()))?;
    tracing::info!(events = replay.event_count(), script = %script.display(), "replay loaded");

    let options = SessionOptions {
        capture_delay: config.capture_delay,
        gate_on_ready: config.gate_on_ready,
        initial_label: config.initial_label.clone(),
    };
    let (session, summary) = Session::open(
        config.processor,
        Box::new(ReferenceProcessors::default()),
        EnrollmentStore::new(&config.store_dir),
        options,
    )?;
    report_reload(&summary);

    let engine = engine::spawn_engine(session);
    let mut sink: Box<dyn FrameSink> = if write_frames {
        Box::new(PngSink::create(&config.output_dir)?)
    } else {
        Box::new(NullSink)
    };

    let mut ticker = tokio::time::interval(config.frame_interval);
    let mut enrolled = 0usize;
    let mut failed = 0usize;

    for step in replay.steps() {
        let step = step.with_context(|| format!("replaying {}", script.display()))?;
        ticker.tick().await;
        for action in step.actions {
            apply_action(&engine, action).await?;
        }

        let output = engine.process_frame(step.event).await?;
        match &output.capture {
            CaptureOutcome::Enrolled { stem, label, targets } => {
                enrolled += 1;
                println!("enrolled {label} as {stem} ({targets} targets)");
            }
            CaptureOutcome::Failed(e) => {
                failed += 1;
                tracing::error!(sequence = output.sequence, error = %e, "enrollment failed");
            }
            CaptureOutcome::Idle | CaptureOutcome::AwaitingFace => {}
        }
        sink.show(output.sequence, &output.annotation.image)?;
    }

    let status = engine.status().await?;
    println!(
        "{}",
        serde_json::json!({
            "processor": status.processor.name(),
            "targets": status.targets,
            "next_label": status.label,
            "enrolled": enrolled,
            "failed": failed,
            "ready": status.ready,
            "capture_pending": status.training_in_progress || status.capture_armed,
        })
    );
    Ok(())
}

async fn apply_action(engine: &EngineHandle, action: OperatorAction) -> Result<()> {
    match action {
        OperatorAction::SetLabel(label) => match engine.set_label(label.clone()).await {
            Ok(()) => tracing::info!(%label, "label set"),
            Err(EngineError::Session(SessionError::EmptyLabel)) => {
                tracing::warn!("ignoring empty label");
            }
            Err(e) => return Err(e.into()),
        },
        OperatorAction::SelectProcessor(name) => match name.parse::<ProcessorKind>() {
            Ok(kind) => report_reload(&engine.select_processor(kind).await?),
            Err(e) => tracing::warn!(error = %e, "ignoring processor selection"),
        },
        OperatorAction::Train => match engine.train().await {
            Ok(_) => tracing::info!("training started"),
            Err(EngineError::Session(SessionError::NotReady)) => {
                tracing::warn!("train ignored: no ready face");
            }
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

fn report_reload(summary: &ReloadSummary) {
    for skipped in &summary.skipped {
        tracing::warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped enrollment record");
    }
    tracing::info!(
        processor = %summary.kind,
        loaded = summary.loaded,
        pushed = summary.pushed,
        "targets loaded"
    );
}

fn list_records(config: &Config, kind: ProcessorKind) -> Result<()> {
    let store = EnrollmentStore::new(&config.store_dir);
    let stems = store.list(kind)?;
    if stems.is_empty() {
        println!("No {kind} records enrolled");
        return Ok(());
    }

    let report = store.load_all(kind)?;
    for record in &report.records {
        let features = if record.has_features() { "features" } else { "image only" };
        println!("{}\t{features}", record.label);
    }
    for skipped in &report.skipped {
        println!("unreadable: {} ({})", skipped.path.display(), skipped.reason);
    }
    Ok(())
}

fn print_status(config: &Config) -> Result<()> {
    let store = EnrollmentStore::new(&config.store_dir);
    let mut enrolled = serde_json::Map::new();
    for kind in ProcessorKind::ALL {
        enrolled.insert(kind.name().to_string(), store.list(kind)?.len().into());
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "store_dir": config.store_dir.display().to_string(),
            "processor": config.processor.name(),
            "capture_delay_ms": config.capture_delay.as_millis() as u64,
            "gate_on_ready": config.gate_on_ready,
            "enrolled": enrolled,
        }))?
    );
    Ok(())
}
