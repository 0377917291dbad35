use kinface_core::ProcessorKind;
use std::path::PathBuf;
use std::time::Duration;

/// Demo configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding enrollment artifacts (default: current directory).
    pub store_dir: PathBuf,
    /// Directory annotated frames are written to.
    pub output_dir: PathBuf,
    /// Delay between "train" and the capture being armed.
    pub capture_delay: Duration,
    /// Label for the first enrollment.
    pub initial_label: String,
    /// Processor selected at startup.
    pub processor: ProcessorKind,
    /// Whether arming a capture requires a ready face.
    pub gate_on_ready: bool,
    /// Pacing between replayed frames.
    pub frame_interval: Duration,
}

impl Config {
    /// Load configuration from `KINFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let processor = std::env::var("KINFACE_PROCESSOR")
            .ok()
            .and_then(|v| match v.parse() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring KINFACE_PROCESSOR");
                    None
                }
            })
            .unwrap_or(ProcessorKind::FeatureModel);

        Self {
            store_dir: std::env::var("KINFACE_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            output_dir: std::env::var("KINFACE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("frames")),
            capture_delay: Duration::from_millis(env_u64("KINFACE_CAPTURE_DELAY_MS", 2000)),
            initial_label: std::env::var("KINFACE_INITIAL_LABEL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| kinface_core::session::DEFAULT_LABEL.to_string()),
            processor,
            gate_on_ready: std::env::var("KINFACE_GATE_ON_READY")
                .map(|v| v != "0")
                .unwrap_or(false),
            frame_interval: Duration::from_millis(env_u64("KINFACE_FRAME_INTERVAL_MS", 33)),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
