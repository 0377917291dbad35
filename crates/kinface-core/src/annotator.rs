//! Per-frame recognition feedback.
//!
//! Decides the outline colour from tracking state, places capture-angle hint
//! markers for the feature-model strategy, captions the matched key, and
//! composites all of it onto a copy of the frame.

use crate::draw;
use crate::types::{MatchResult, ProcessorKind};
use image::{Rgb, RgbImage};
use kinface_sensor::{BuilderStatus, TrackedFace};

/// Pen width of the face outline, in pixels.
pub const OUTLINE_PEN_WIDTH: u32 = 5;
/// Caption baseline offset above the face box.
pub const CAPTION_OFFSET_Y: i32 = 25;
/// Caption font scale (font pixel → image pixels).
pub const CAPTION_SCALE: u32 = 4;

const GREEN: Rgb<u8> = Rgb([0, 128, 0]);
const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Face outline colour; doubles as the readiness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineColor {
    /// Green: ready to enroll.
    Ready,
    /// Orange: builder finished collecting, model not yet built.
    Warning,
    /// Red: model still being collected.
    NotReady,
}

impl OutlineColor {
    pub fn rgb(self) -> Rgb<u8> {
        match self {
            OutlineColor::Ready => GREEN,
            OutlineColor::Warning => ORANGE,
            OutlineColor::NotReady => RED,
        }
    }
}

/// Capture angle a hint marker asks the user to turn towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerDirection {
    Left,
    Right,
    Up,
    Front,
}

/// A filled square hint, `size`×`size`, top-left at (`x`, `y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub direction: MarkerDirection,
    pub x: i32,
    pub y: i32,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

/// Everything drawn on one frame, plus the composited result.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnnotation {
    pub image: RgbImage,
    /// `None` when no face was tracked.
    pub outline: Option<OutlineColor>,
    pub markers: Vec<Marker>,
    pub caption: Option<Caption>,
}

impl FrameAnnotation {
    /// Ready for training: a face is present and its outline is green.
    pub fn is_ready(&self) -> bool {
        self.outline == Some(OutlineColor::Ready)
    }
}

/// Outline colour for a tracked face under the active strategy.
///
/// Only the feature-model strategy depends on a constructed model; for it,
/// no model means red, upgraded to orange once the builder reports its
/// collection complete.
pub fn outline_color(kind: ProcessorKind, face: &TrackedFace) -> OutlineColor {
    if !kind.is_feature_rich() || face.model.is_some() {
        return OutlineColor::Ready;
    }
    if face.builder_status.is_complete() {
        OutlineColor::Warning
    } else {
        OutlineColor::NotReady
    }
}

/// One marker per capture angle the builder still needs.
///
/// `scale = (w + h) / 6`; side markers sit `2 * scale` outside the box at
/// mid-height, the tilt marker `2 * scale` above it at mid-width, and the
/// front marker at the box centre.
pub fn view_markers(face: &TrackedFace) -> Vec<Marker> {
    let rect = face.rect;
    let status = face.builder_status;
    let scale = rect.width.saturating_add(rect.height) / 6;
    let offset = scale.saturating_mul(2);
    let (mid_x, mid_y) = rect.center();

    let candidates = [
        (BuilderStatus::LEFT_VIEWS_NEEDED, MarkerDirection::Left, rect.left().saturating_sub(offset), mid_y),
        (BuilderStatus::RIGHT_VIEWS_NEEDED, MarkerDirection::Right, rect.right().saturating_add(offset), mid_y),
        (BuilderStatus::TILTED_UP_VIEWS_NEEDED, MarkerDirection::Up, mid_x, rect.top().saturating_sub(offset)),
        (BuilderStatus::FRONT_VIEW_FRAMES_NEEDED, MarkerDirection::Front, mid_x, mid_y),
    ];

    candidates
        .into_iter()
        .filter(|(flag, ..)| status.contains(*flag))
        .map(|(_, direction, x, y)| Marker {
            direction,
            x,
            y,
            size: scale,
        })
        .collect()
}

/// `"<key>: <score>"` above the face box, score rounded to two decimals.
pub fn caption(face: &TrackedFace, recognition: Option<&MatchResult>) -> Option<Caption> {
    let result = recognition?;
    let key = result.matched_key()?;
    let score = round_half_even(result.score as f64 * 100.0) / 100.0;

    Some(Caption {
        text: format!("{key}: {score}"),
        x: face.rect.left(),
        y: face.rect.top().saturating_sub(CAPTION_OFFSET_Y),
    })
}

/// Round to the nearest integer, ties to the even neighbour.
fn round_half_even(v: f64) -> f64 {
    if (v - v.trunc()).abs() == 0.5 {
        2.0 * (v / 2.0).round()
    } else {
        v.round()
    }
}

/// Builds annotated frames. Stateless apart from drawing parameters.
#[derive(Debug, Clone, Copy)]
pub struct FrameAnnotator {
    pub pen_width: u32,
    pub caption_scale: u32,
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self {
            pen_width: OUTLINE_PEN_WIDTH,
            caption_scale: CAPTION_SCALE,
        }
    }
}

impl FrameAnnotator {
    /// Annotate a copy of `frame`; the caller's frame is left untouched.
    pub fn annotate(
        &self,
        kind: ProcessorKind,
        face: Option<&TrackedFace>,
        recognition: Option<&MatchResult>,
        frame: &RgbImage,
    ) -> FrameAnnotation {
        let mut image = frame.clone();

        let Some(face) = face else {
            return FrameAnnotation {
                image,
                outline: None,
                markers: Vec::new(),
                caption: None,
            };
        };

        let outline = outline_color(kind, face);
        let markers = if kind.is_feature_rich() {
            view_markers(face)
        } else {
            Vec::new()
        };
        let caption = caption(face, recognition);

        for m in &markers {
            draw::fill_rect(&mut image, m.x, m.y, m.size, m.size, RED);
        }
        draw::draw_polygon(&mut image, &face.outline_path(), self.pen_width, outline.rgb());
        if let Some(c) = &caption {
            draw::draw_text(&mut image, c.x, c.y, &c.text, self.caption_scale, RED);
        }

        tracing::trace!(
            outline = ?outline,
            markers = markers.len(),
            captioned = caption.is_some(),
            "frame annotated"
        );

        FrameAnnotation {
            image,
            outline: Some(outline),
            markers,
            caption,
        }
    }
}
