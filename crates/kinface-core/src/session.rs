//! The frame-event pipeline.
//!
//! A [`Session`] owns every piece of mutable state: the active processor,
//! the enrolled targets, the capture countdown and the user-entered label.
//! Callers drive it from a single event loop: frames through
//! [`Session::process_event`], operator input through the other entry
//! points, and the countdown expiry through [`Session::poll_capture`].

use crate::annotator::{FrameAnnotation, FrameAnnotator};
use crate::enrollment;
use crate::processor::{ProcessorFactory, RecognitionProcessor};
use crate::registry::TargetRegistry;
use crate::scheduler::{CaptureScheduler, DEFAULT_CAPTURE_DELAY};
use crate::store::{EnrollmentStore, SkippedRecord, StoreError};
use crate::types::{MatchResult, ProcessorKind};
use image::RgbImage;
use kinface_sensor::{SensorEvent, TrackedFace};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_LABEL: &str = "Face 1";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("enrollment label must not be empty")]
    EmptyLabel,
    #[error("no ready face in the last frame; capture not armed")]
    NotReady,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub capture_delay: Duration,
    /// Refuse to arm a capture unless the last frame was ready.
    pub gate_on_ready: bool,
    pub initial_label: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            capture_delay: DEFAULT_CAPTURE_DELAY,
            gate_on_ready: false,
            initial_label: DEFAULT_LABEL.to_string(),
        }
    }
}

/// Outcome of processor selection.
#[derive(Debug)]
pub struct ReloadSummary {
    pub kind: ProcessorKind,
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
    /// Whether the reloaded targets were handed to the new processor.
    pub pushed: bool,
}

/// What the capture path did with this frame.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// No capture armed.
    Idle,
    /// Armed, but no face in this frame; stays armed for the next one.
    AwaitingFace,
    Enrolled {
        stem: String,
        label: String,
        targets: usize,
    },
    /// Saving failed. Nothing was added to the registry and the capture
    /// was disarmed.
    Failed(StoreError),
}

/// Result of processing one frame event.
#[derive(Debug)]
pub struct FrameOutput {
    pub sequence: u32,
    pub annotation: FrameAnnotation,
    pub capture: CaptureOutcome,
}

pub struct Session {
    kind: ProcessorKind,
    processor: Box<dyn RecognitionProcessor>,
    factory: Box<dyn ProcessorFactory>,
    store: EnrollmentStore,
    registry: TargetRegistry,
    scheduler: CaptureScheduler,
    annotator: FrameAnnotator,
    label: String,
    ready: bool,
    gate_on_ready: bool,
}

impl Session {
    /// Create a session and load `kind`'s enrolled targets.
    pub fn open(
        kind: ProcessorKind,
        factory: Box<dyn ProcessorFactory>,
        store: EnrollmentStore,
        options: SessionOptions,
    ) -> Result<(Self, ReloadSummary), SessionError> {
        if options.initial_label.is_empty() {
            return Err(SessionError::EmptyLabel);
        }

        let processor = factory.create(kind);
        let mut session = Self {
            kind,
            processor,
            factory,
            store,
            registry: TargetRegistry::new(),
            scheduler: CaptureScheduler::new(options.capture_delay),
            annotator: FrameAnnotator::default(),
            label: options.initial_label,
            ready: false,
            gate_on_ready: options.gate_on_ready,
        };
        let summary = session.select_processor(kind)?;
        Ok((session, summary))
    }

    /// Switch the active processor, reloading its partition from the store.
    ///
    /// On a store failure the session keeps its current processor and
    /// targets.
    pub fn select_processor(&mut self, kind: ProcessorKind) -> Result<ReloadSummary, SessionError> {
        let report = self.store.load_all(kind)?;

        self.kind = kind;
        self.processor = self.factory.create(kind);
        self.registry.reset(report.records);
        let pushed = self.update_targets();

        tracing::info!(
            kind = %kind,
            targets = self.registry.len(),
            skipped = report.skipped.len(),
            pushed,
            label = %self.label,
            "processor selected"
        );

        Ok(ReloadSummary {
            kind,
            loaded: self.registry.len(),
            skipped: report.skipped,
            pushed,
        })
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<(), SessionError> {
        let label = label.into();
        if label.is_empty() {
            return Err(SessionError::EmptyLabel);
        }
        self.label = label;
        Ok(())
    }

    /// Start the capture countdown; returns when it will expire.
    pub fn arm_capture(&mut self, now: Instant) -> Result<Instant, SessionError> {
        if self.gate_on_ready && !self.ready {
            return Err(SessionError::NotReady);
        }
        let deadline = self.scheduler.arm(now);
        tracing::info!(delay_ms = self.scheduler.delay().as_millis() as u64, "training countdown started");
        Ok(deadline)
    }

    /// Deliver the countdown expiry. Returns true if this armed the capture.
    pub fn poll_capture(&mut self, now: Instant) -> bool {
        let fired = self.scheduler.poll(now);
        if fired {
            tracing::info!("capture armed; next face will be enrolled");
        }
        fired
    }

    pub fn capture_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Handle one tracked-face event: annotate, and capture if armed.
    pub fn process_event(&mut self, event: &SensorEvent) -> FrameOutput {
        let face = event.primary_face();
        let recognition = face.and_then(|f| self.processor.recognize(f, &event.frame));

        let annotation = self
            .annotator
            .annotate(self.kind, face, recognition.as_ref(), &event.frame);
        self.ready = annotation.is_ready();

        let capture = match (self.scheduler.is_armed(), face) {
            (false, _) => CaptureOutcome::Idle,
            (true, None) => {
                tracing::debug!(sequence = event.sequence, "capture armed but no face; waiting");
                CaptureOutcome::AwaitingFace
            }
            (true, Some(face)) => self.capture(face, recognition.as_ref(), &event.frame),
        };

        FrameOutput {
            sequence: event.sequence,
            annotation,
            capture,
        }
    }

    fn capture(&mut self, face: &TrackedFace, recognition: Option<&MatchResult>, frame: &RgbImage) -> CaptureOutcome {
        let record = enrollment::build_record(self.kind, &self.label, face, recognition, frame);
        self.scheduler.consume();

        // Saved before it joins the registry, so memory never holds a target
        // that is not on disk.
        match self.store.save(&record, self.kind) {
            Ok(stem) => {
                let label = record.label.clone();
                self.registry.add(record);
                self.update_targets();
                tracing::info!(
                    stem = %stem,
                    label = %label,
                    targets = self.registry.len(),
                    next_label = %self.label,
                    "face enrolled"
                );
                CaptureOutcome::Enrolled {
                    stem,
                    label,
                    targets: self.registry.len(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, label = %record.label, "failed to save enrollment; capture discarded");
                CaptureOutcome::Failed(e)
            }
        }
    }

    /// Push targets to the processor (threshold permitting) and advance the
    /// default label.
    fn update_targets(&mut self) -> bool {
        let pushed = self.registry.push_to(self.processor.as_mut());
        self.label = enrollment::advance_label(&self.label, self.registry.len());
        pushed
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn store(&self) -> &EnrollmentStore {
        &self.store
    }

    /// Whether the last processed frame had a ready face.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// True while the capture countdown is running.
    pub fn training_in_progress(&self) -> bool {
        self.scheduler.in_progress()
    }

    pub fn capture_armed(&self) -> bool {
        self.scheduler.is_armed()
    }
}
