//! Tracked-face events as delivered by the tracking engine.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis-aligned face bounding box in colour-frame pixel coordinates.
///
/// Coordinates are signed: a face near the frame edge can report a box that
/// extends past it. Derived edges saturate at the `i32` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRect {
    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Integer centre point, `(x + w/2, y + h/2)`.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    /// Closed outline through the four corners, clockwise from top-left.
    pub fn corners(&self) -> Vec<(i32, i32)> {
        vec![
            (self.left(), self.top()),
            (self.right(), self.top()),
            (self.right(), self.bottom()),
            (self.left(), self.bottom()),
        ]
    }
}

/// 8-bit RGB colour reported by the face model builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A single capture angle the face model builder still needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewNeeded {
    MoreFrames,
    FrontView,
    Left,
    Right,
    TiltedUp,
}

impl ViewNeeded {
    const ALL: [ViewNeeded; 5] = [
        ViewNeeded::MoreFrames,
        ViewNeeded::FrontView,
        ViewNeeded::Left,
        ViewNeeded::Right,
        ViewNeeded::TiltedUp,
    ];

    fn bit(self) -> u32 {
        match self {
            ViewNeeded::MoreFrames => BuilderStatus::MORE_FRAMES_NEEDED.0,
            ViewNeeded::FrontView => BuilderStatus::FRONT_VIEW_FRAMES_NEEDED.0,
            ViewNeeded::Left => BuilderStatus::LEFT_VIEWS_NEEDED.0,
            ViewNeeded::Right => BuilderStatus::RIGHT_VIEWS_NEEDED.0,
            ViewNeeded::TiltedUp => BuilderStatus::TILTED_UP_VIEWS_NEEDED.0,
        }
    }
}

/// Face model builder collection status.
///
/// A bitmask of capture angles still missing. `Complete` is the empty mask:
/// the builder has collected everything it needs, whether or not a model
/// has materialized yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ViewNeeded>", into = "Vec<ViewNeeded>")]
pub struct BuilderStatus(u32);

impl BuilderStatus {
    pub const COMPLETE: Self = Self(0);
    pub const MORE_FRAMES_NEEDED: Self = Self(1);
    pub const FRONT_VIEW_FRAMES_NEEDED: Self = Self(2);
    pub const LEFT_VIEWS_NEEDED: Self = Self(4);
    pub const RIGHT_VIEWS_NEEDED: Self = Self(8);
    pub const TILTED_UP_VIEWS_NEEDED: Self = Self(16);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `flag` is set.
    pub const fn contains(self, flag: BuilderStatus) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub const fn is_complete(self) -> bool {
        self.0 == Self::COMPLETE.0
    }

    /// Combine two masks.
    pub const fn with(self, flag: BuilderStatus) -> Self {
        Self(self.0 | flag.0)
    }
}

impl From<Vec<ViewNeeded>> for BuilderStatus {
    fn from(views: Vec<ViewNeeded>) -> Self {
        Self(views.iter().fold(0, |acc, v| acc | v.bit()))
    }
}

impl From<BuilderStatus> for Vec<ViewNeeded> {
    fn from(status: BuilderStatus) -> Self {
        ViewNeeded::ALL
            .into_iter()
            .filter(|v| status.0 & v.bit() != 0)
            .collect()
    }
}

/// Features of a constructed face model: colours plus shape deformations
/// keyed by deformation kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceModelSnapshot {
    pub hair_color: RgbColor,
    pub skin_color: RgbColor,
    #[serde(default)]
    pub deformations: BTreeMap<String, f32>,
}

/// One face as reported by the tracking engine for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFace {
    pub rect: FaceRect,
    /// Face outline polygon; empty means "use the bounding box".
    pub outline: Vec<(i32, i32)>,
    pub builder_status: BuilderStatus,
    /// Constructed face model, once the builder has produced one.
    pub model: Option<FaceModelSnapshot>,
}

impl TrackedFace {
    pub fn new(rect: FaceRect) -> Self {
        Self {
            rect,
            outline: Vec::new(),
            builder_status: BuilderStatus::COMPLETE,
            model: None,
        }
    }

    /// Outline to draw: the tracked polygon, or the bounding box corners.
    pub fn outline_path(&self) -> Vec<(i32, i32)> {
        if self.outline.is_empty() {
            self.rect.corners()
        } else {
            self.outline.clone()
        }
    }
}

/// A frame plus the faces tracked in it.
#[derive(Debug, Clone)]
pub struct SensorEvent {
    pub sequence: u32,
    /// Tracked faces, in engine order.
    pub faces: Vec<TrackedFace>,
    pub frame: RgbImage,
}

impl SensorEvent {
    /// The face the demo works with: the first one tracked.
    pub fn primary_face(&self) -> Option<&TrackedFace> {
        self.faces.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_center_uses_integer_halves() {
        let rect = FaceRect { x: 10, y: 20, width: 31, height: 41 };
        assert_eq!(rect.center(), (25, 40));
        assert_eq!(rect.right(), 41);
        assert_eq!(rect.bottom(), 61);
    }

    #[test]
    fn test_rect_edges_saturate() {
        let rect = FaceRect { x: i32::MAX - 50, y: i32::MIN, width: 100, height: -10 };
        assert_eq!(rect.right(), i32::MAX);
        assert_eq!(rect.bottom(), i32::MIN);
        assert_eq!(rect.center(), (i32::MAX, i32::MIN));
    }

    #[test]
    fn test_builder_status_contains_each_bit() {
        let status = BuilderStatus::LEFT_VIEWS_NEEDED.with(BuilderStatus::FRONT_VIEW_FRAMES_NEEDED);
        assert!(status.contains(BuilderStatus::LEFT_VIEWS_NEEDED));
        assert!(status.contains(BuilderStatus::FRONT_VIEW_FRAMES_NEEDED));
        assert!(!status.contains(BuilderStatus::RIGHT_VIEWS_NEEDED));
        assert!(!status.contains(BuilderStatus::TILTED_UP_VIEWS_NEEDED));
        assert!(!status.is_complete());
    }

    #[test]
    fn test_complete_is_empty_mask() {
        assert!(BuilderStatus::COMPLETE.is_complete());
        assert!(BuilderStatus::default().is_complete());
        assert_eq!(BuilderStatus::COMPLETE.bits(), 0);
    }

    #[test]
    fn test_builder_status_from_view_list() {
        let status = BuilderStatus::from(vec![ViewNeeded::Right, ViewNeeded::TiltedUp]);
        assert_eq!(status.bits(), 8 | 16);

        let views: Vec<ViewNeeded> = status.into();
        assert_eq!(views, vec![ViewNeeded::Right, ViewNeeded::TiltedUp]);
    }

    #[test]
    fn test_outline_falls_back_to_rect() {
        let face = TrackedFace::new(FaceRect { x: 0, y: 0, width: 10, height: 5 });
        assert_eq!(face.outline_path(), vec![(0, 0), (10, 0), (10, 5), (0, 5)]);

        let mut traced = face.clone();
        traced.outline = vec![(1, 1), (2, 2), (3, 1)];
        assert_eq!(traced.outline_path().len(), 3);
    }

    #[test]
    fn test_primary_face_is_first() {
        let event = SensorEvent {
            sequence: 0,
            faces: vec![
                TrackedFace::new(FaceRect { x: 1, y: 1, width: 1, height: 1 }),
                TrackedFace::new(FaceRect { x: 2, y: 2, width: 2, height: 2 }),
            ],
            frame: RgbImage::new(4, 4),
        };
        assert_eq!(event.primary_face().map(|f| f.rect.x), Some(1));
    }
}
