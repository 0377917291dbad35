//! kinface-core — Frame-event processing and enrollment pipeline.
//!
//! Annotates tracked-face frames with recognition feedback, runs the timed
//! enrollment capture, and persists enrollment records partitioned by the
//! active recognition strategy.

pub mod annotator;
pub mod crop;
pub mod draw;
pub mod enrollment;
pub mod processor;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod types;

pub use annotator::{FrameAnnotation, FrameAnnotator, Marker, MarkerDirection, OutlineColor};
pub use processor::{ProcessorFactory, RecognitionProcessor, ReferenceProcessors};
pub use registry::TargetRegistry;
pub use scheduler::CaptureScheduler;
pub use session::{CaptureOutcome, FrameOutput, ReloadSummary, Session, SessionError, SessionOptions};
pub use store::{EnrollmentStore, LoadReport, StoreError};
pub use types::{EnrollmentRecord, MatchPayload, MatchResult, ProcessorKind};
