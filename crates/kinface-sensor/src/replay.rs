//! Scripted sensor replay.
//!
//! A replay manifest stands in for the live tracking engine. Each `[[step]]`
//! names a colour frame (or falls back to a blank one), the faces tracked in
//! it, and any operator actions taken just before it arrives:
//!
//! ```toml
//! frame_size = [640, 480]
//!
//! [[step]]
//! frame = "frames/0001.png"
//! label = "Alice 1"
//! train = true
//! repeat = 60
//!
//! [[step.face]]
//! rect = { x = 260, y = 140, width = 120, height = 150 }
//! builder_status = ["left", "front-view"]
//! ```

use crate::frame::{self, FrameError};
use crate::tracking::{BuilderStatus, FaceModelSnapshot, FaceRect, SensorEvent, TrackedFace};
use image::RgbImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_FRAME_SIZE: (u32, u32) = (640, 480);
/// Largest face coordinate or extent a manifest may use, in pixels.
const MAX_COORD: i32 = 1 << 16;
/// Largest blank-frame side a manifest may request.
const MAX_FRAME_SIDE: u32 = 8192;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad replay manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    /// Face geometry a tracker could not report; `step` is 1-based.
    #[error("step {step}: {detail}")]
    InvalidFace { step: usize, detail: String },
    #[error("frame_size {0}x{1} out of range (1..=8192)")]
    InvalidFrameSize(u32, u32),
}

/// Something the operator does between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorAction {
    /// Replace the label used for the next enrollment.
    SetLabel(String),
    /// Switch recognition processor (by name, e.g. "appearance").
    SelectProcessor(String),
    /// Press the train button.
    Train,
}

/// One replayed event with the operator actions that precede it.
#[derive(Debug, Clone)]
pub struct ReplayStep {
    pub actions: Vec<OperatorAction>,
    pub event: SensorEvent,
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    #[serde(default = "default_frame_size")]
    frame_size: (u32, u32),
    #[serde(default, rename = "step")]
    steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct StepSpec {
    frame: Option<PathBuf>,
    label: Option<String>,
    select: Option<String>,
    #[serde(default)]
    train: bool,
    #[serde(default = "default_repeat")]
    repeat: u32,
    #[serde(default, rename = "face")]
    faces: Vec<FaceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct FaceSpec {
    rect: FaceRect,
    #[serde(default)]
    outline: Vec<(i32, i32)>,
    #[serde(default)]
    builder_status: BuilderStatus,
    model: Option<FaceModelSnapshot>,
}

fn default_frame_size() -> (u32, u32) {
    DEFAULT_FRAME_SIZE
}

fn default_repeat() -> u32 {
    1
}

impl FaceSpec {
    fn check(&self) -> Result<(), String> {
        let r = self.rect;
        if r.width < 0 || r.height < 0 {
            return Err(format!("negative face size {}x{}", r.width, r.height));
        }
        let in_range = |v: i32| (-MAX_COORD..=MAX_COORD).contains(&v);
        if ![r.x, r.y, r.width, r.height].into_iter().all(in_range) {
            return Err(format!("face rect {r:?} exceeds ±{MAX_COORD}"));
        }
        if let Some(p) = self.outline.iter().find(|(x, y)| !in_range(*x) || !in_range(*y)) {
            return Err(format!("outline point {p:?} exceeds ±{MAX_COORD}"));
        }
        Ok(())
    }
}

impl Manifest {
    fn validate(&self) -> Result<(), ReplayError> {
        let (w, h) = self.frame_size;
        if !(1..=MAX_FRAME_SIDE).contains(&w) || !(1..=MAX_FRAME_SIDE).contains(&h) {
            return Err(ReplayError::InvalidFrameSize(w, h));
        }
        for (i, step) in self.steps.iter().enumerate() {
            for face in &step.faces {
                face.check()
                    .map_err(|detail| ReplayError::InvalidFace { step: i + 1, detail })?;
            }
        }
        Ok(())
    }
}

impl StepSpec {
    fn actions(&self) -> Vec<OperatorAction> {
        let mut actions = Vec::new();
        if let Some(label) = &self.label {
            actions.push(OperatorAction::SetLabel(label.clone()));
        }
        if let Some(kind) = &self.select {
            actions.push(OperatorAction::SelectProcessor(kind.clone()));
        }
        if self.train {
            actions.push(OperatorAction::Train);
        }
        actions
    }

    fn faces(&self) -> Vec<TrackedFace> {
        self.faces
            .iter()
            .map(|f| TrackedFace {
                rect: f.rect,
                outline: f.outline.clone(),
                builder_status: f.builder_status,
                model: f.model.clone(),
            })
            .collect()
    }
}

/// A parsed replay manifest; frame paths resolve against `base_dir`.
#[derive(Debug, Clone)]
pub struct ReplayScript {
    base_dir: PathBuf,
    manifest: Manifest,
}

impl ReplayScript {
    /// Load a manifest from disk. Relative frame paths resolve against the
    /// manifest's directory.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let src = std::fs::read_to_string(path).map_err(|e| ReplayError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&src, base_dir)
    }

    /// Parse and validate a manifest. Face rects must have non-negative size
    /// and stay within ±65536 px.
    pub fn parse(src: &str, base_dir: PathBuf) -> Result<Self, ReplayError> {
        let manifest: Manifest = toml::from_str(src)?;
        manifest.validate()?;
        tracing::debug!(
            steps = manifest.steps.len(),
            width = manifest.frame_size.0,
            height = manifest.frame_size.1,
            "parsed replay manifest"
        );
        Ok(Self { base_dir, manifest })
    }

    /// Total number of events the script yields, counting repeats.
    pub fn event_count(&self) -> usize {
        self.manifest.steps.iter().map(|s| s.repeat as usize).sum()
    }

    /// Iterate the script's events.
    ///
    /// Each step's frame is decoded when the step starts and released when
    /// its last repetition is emitted, so at most one step's frame is held
    /// besides the events the caller keeps. Operator actions attach to the
    /// first repetition of their step only. A frame that fails to decode
    /// ends the iteration after its error.
    pub fn steps(&self) -> ReplaySteps<'_> {
        ReplaySteps {
            script: self,
            specs: self.manifest.steps.iter(),
            current: None,
            sequence: 0,
            failed: false,
        }
    }

    fn frame_for(&self, spec: &StepSpec) -> Result<RgbImage, ReplayError> {
        match &spec.frame {
            Some(rel) => Ok(frame::load_frame(&self.base_dir.join(rel))?),
            None => {
                let (w, h) = self.manifest.frame_size;
                Ok(frame::blank_frame(w, h))
            }
        }
    }
}

/// Lazy event iterator returned by [`ReplayScript::steps`].
pub struct ReplaySteps<'a> {
    script: &'a ReplayScript,
    specs: std::slice::Iter<'a, StepSpec>,
    current: Option<ActiveStep<'a>>,
    sequence: u32,
    failed: bool,
}

struct ActiveStep<'a> {
    spec: &'a StepSpec,
    frame: RgbImage,
    faces: Vec<TrackedFace>,
    emitted: u32,
}

impl Iterator for ReplaySteps<'_> {
    type Item = Result<ReplayStep, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(active) = &mut self.current {
                if active.emitted < active.spec.repeat {
                    let actions = if active.emitted == 0 { active.spec.actions() } else { Vec::new() };
                    active.emitted += 1;
                    let frame = if active.emitted == active.spec.repeat {
                        std::mem::take(&mut active.frame)
                    } else {
                        active.frame.clone()
                    };

                    let event = SensorEvent {
                        sequence: self.sequence,
                        faces: active.faces.clone(),
                        frame,
                    };
                    self.sequence = self.sequence.wrapping_add(1);
                    return Some(Ok(ReplayStep { actions, event }));
                }
            }

            self.current = None;
            let spec = self.specs.next()?;
            if spec.repeat == 0 {
                continue;
            }
            match self.script.frame_for(spec) {
                Ok(frame) => {
                    self.current = Some(ActiveStep {
                        spec,
                        frame,
                        faces: spec.faces(),
                        emitted: 0,
                    });
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
