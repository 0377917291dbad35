//! kinface-sensor — Sensor abstraction for the facial-tracking demo.
//!
//! Describes the events a depth-camera tracking engine emits (tracked faces
//! plus the colour frame they were found in), converts raw colour buffers,
//! and replays scripted sessions from a TOML manifest.

pub mod frame;
pub mod replay;
pub mod tracking;

pub use frame::FrameError;
pub use replay::{OperatorAction, ReplayError, ReplayScript, ReplayStep, ReplaySteps};
pub use tracking::{BuilderStatus, FaceModelSnapshot, FaceRect, RgbColor, SensorEvent, TrackedFace, ViewNeeded};
