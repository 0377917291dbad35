//! Recognition strategies.
//!
//! The pipeline treats recognition as a black box behind
//! [`RecognitionProcessor`]: it pushes enrolled targets in and gets one scored
//! match per tracked face out. Two reference strategies ship with the crate
//! so the demo runs without a vendor SDK; both rank targets by cosine
//! similarity.

use crate::crop;
use crate::types::{Deformations, EnrollmentRecord, MatchPayload, MatchResult, ProcessorKind};
use image::{GrayImage, RgbImage};
use kinface_sensor::TrackedFace;

/// Default minimum similarity for the reference strategies to report a key.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.80;

/// A face recognition strategy.
pub trait RecognitionProcessor: Send {
    fn kind(&self) -> ProcessorKind;

    /// Replace the enrolled targets this strategy matches against.
    fn set_target_faces(&mut self, targets: &[EnrollmentRecord]);

    /// Match one tracked face. `None` when the strategy cannot evaluate the
    /// face at all (e.g. no constructed model yet).
    fn recognize(&self, face: &TrackedFace, frame: &RgbImage) -> Option<MatchResult>;
}

/// Builds the strategy for a given kind on processor selection.
pub trait ProcessorFactory: Send {
    fn create(&self, kind: ProcessorKind) -> Box<dyn RecognitionProcessor>;
}

impl<F> ProcessorFactory for F
where
    F: Fn(ProcessorKind) -> Box<dyn RecognitionProcessor> + Send,
{
    fn create(&self, kind: ProcessorKind) -> Box<dyn RecognitionProcessor> {
        self(kind)
    }
}

/// Factory for the built-in reference strategies.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceProcessors {
    pub threshold: f32,
}

impl Default for ReferenceProcessors {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl ProcessorFactory for ReferenceProcessors {
    fn create(&self, kind: ProcessorKind) -> Box<dyn RecognitionProcessor> {
        match kind {
            ProcessorKind::FeatureModel => Box::new(FeatureModelProcessor::new(self.threshold)),
            ProcessorKind::Appearance => Box::new(AppearanceProcessor::new(self.threshold)),
        }
    }
}

/// Cosine similarity in [-1, 1]; 0 when either vector has zero norm.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 { dot / denom } else { 0.0 }
}

/// Pick the best-scoring label from `(label, similarity)` pairs.
///
/// Returns the label only when the best score reaches `threshold`; the score
/// is reported either way (0 when nothing was scored).
fn pick_best<'a, I>(scores: I, threshold: f32) -> (Option<String>, f32)
where
    I: IntoIterator<Item = (&'a str, f32)>,
{
    let mut best_sim = f32::NEG_INFINITY;
    let mut best_label: Option<&str> = None;

    // Every entry is scored; no early exit on a good-enough match.
    for (label, sim) in scores {
        if sim > best_sim {
            best_sim = sim;
            best_label = Some(label);
        }
    }

    match best_label {
        Some(label) if best_sim >= threshold => (Some(label.to_string()), best_sim),
        Some(_) => (None, best_sim),
        None => (None, 0.0),
    }
}

/// Mean-centred pixel vector of a grayscale sample.
fn appearance_vector(image: &GrayImage) -> Vec<f32> {
    let n = image.as_raw().len().max(1) as f32;
    let mean = image.as_raw().iter().map(|&p| p as f32).sum::<f32>() / n;
    image.as_raw().iter().map(|&p| p as f32 - mean).collect()
}

/// Appearance strategy: compares normalized grayscale face crops.
pub struct AppearanceProcessor {
    threshold: f32,
    targets: Vec<(String, Vec<f32>)>,
}

impl AppearanceProcessor {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            targets: Vec::new(),
        }
    }
}

impl RecognitionProcessor for AppearanceProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Appearance
    }

    fn set_target_faces(&mut self, targets: &[EnrollmentRecord]) {
        self.targets = targets
            .iter()
            .map(|t| (t.label.clone(), appearance_vector(&t.image)))
            .collect();
        tracing::debug!(targets = self.targets.len(), "appearance targets updated");
    }

    fn recognize(&self, face: &TrackedFace, frame: &RgbImage) -> Option<MatchResult> {
        let image = crop::crop_face(frame, &face.rect);
        let probe = appearance_vector(&image);
        let scores = self.targets.iter().map(|(l, v)| (l.as_str(), similarity(&probe, v)));
        let (key, score) = pick_best(scores, self.threshold);

        Some(MatchResult {
            key,
            score,
            payload: MatchPayload::Appearance { image },
        })
    }
}

/// Feature-model strategy: compares shape deformations of the tracker's
/// constructed face model.
pub struct FeatureModelProcessor {
    threshold: f32,
    targets: Vec<(String, Deformations)>,
}

impl FeatureModelProcessor {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            targets: Vec::new(),
        }
    }
}

/// Align two deformation maps on the probe's keys; missing target keys
/// count as zero.
fn aligned_deformations(probe: &Deformations, target: &Deformations) -> (Vec<f32>, Vec<f32>) {
    probe
        .iter()
        .map(|(k, v)| (*v, target.get(k).copied().unwrap_or(0.0)))
        .unzip()
}

impl RecognitionProcessor for FeatureModelProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::FeatureModel
    }

    fn set_target_faces(&mut self, targets: &[EnrollmentRecord]) {
        // Targets without deformations cannot be compared by this strategy.
        self.targets = targets
            .iter()
            .filter_map(|t| t.deformations.as_ref().map(|d| (t.label.clone(), d.clone())))
            .collect();
        tracing::debug!(
            targets = self.targets.len(),
            offered = targets.len(),
            "feature-model targets updated"
        );
    }

    fn recognize(&self, face: &TrackedFace, _frame: &RgbImage) -> Option<MatchResult> {
        let model = face.model.as_ref()?;

        let scores = self.targets.iter().map(|(label, target)| {
            let (p, t) = aligned_deformations(&model.deformations, target);
            (label.as_str(), similarity(&p, &t))
        });
        let (key, score) = pick_best(scores, self.threshold);

        Some(MatchResult {
            key,
            score,
            payload: MatchPayload::FeatureModel {
                hair_color: model.hair_color,
                skin_color: model.skin_color,
                deformations: model.deformations.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use kinface_sensor::{FaceModelSnapshot, FaceRect, RgbColor};

    fn deformations(pairs: &[(&str, f32)]) -> Deformations {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn feature_target(label: &str, pairs: &[(&str, f32)]) -> EnrollmentRecord {
        EnrollmentRecord {
            deformations: Some(deformations(pairs)),
            hair_color: Some(RgbColor::new(1, 2, 3)),
            skin_color: Some(RgbColor::new(4, 5, 6)),
            ..EnrollmentRecord::image_only(label, GrayImage::new(100, 100))
        }
    }

    fn face_with_model(pairs: &[(&str, f32)]) -> TrackedFace {
        let mut face = TrackedFace::new(FaceRect { x: 0, y: 0, width: 10, height: 10 });
        face.model = Some(FaceModelSnapshot {
            hair_color: RgbColor::new(10, 20, 30),
            skin_color: RgbColor::new(200, 150, 120),
            deformations: deformations(pairs),
        });
        face
    }

    #[test]
    fn test_similarity_identical() {
        assert!((similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal() {
        assert!(similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        assert_eq!(similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_pick_best_scans_every_entry() {
        // Best match is the last entry.
        let scores = [("decoy1", 0.1), ("decoy2", 0.3), ("match", 0.95)];
        let (key, score) = pick_best(scores, 0.5);
        assert_eq!(key.as_deref(), Some("match"));
        assert!((score - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_pick_best_below_threshold_keeps_score() {
        let (key, score) = pick_best([("other", 0.6)], 0.9);
        assert!(key.is_none());
        assert!((score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_pick_best_empty() {
        let (key, score) = pick_best(std::iter::empty(), 0.5);
        assert!(key.is_none());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_appearance_matches_enrolled_crop() {
        let mut frame = RgbImage::from_pixel(200, 200, Rgb([30, 30, 30]));
        for y in 40..120 {
            for x in 40..80 {
                frame.put_pixel(x, y, Rgb([220, 220, 220]));
            }
        }
        let face = TrackedFace::new(FaceRect { x: 20, y: 20, width: 120, height: 120 });

        let enrolled = crop::crop_face(&frame, &face.rect);
        let flipped = GrayImage::from_fn(100, 100, |x, y| Luma([enrolled.get_pixel(99 - x, y).0[0]]));

        let mut processor = AppearanceProcessor::new(0.9);
        processor.set_target_faces(&[
            EnrollmentRecord::image_only("Mirror", flipped),
            EnrollmentRecord::image_only("Face 1", enrolled),
        ]);

        let result = processor.recognize(&face, &frame).unwrap();
        assert_eq!(result.matched_key(), Some("Face 1"));
        assert!(result.score > 0.99);
        assert!(matches!(result.payload, MatchPayload::Appearance { ref image } if image.dimensions() == (100, 100)));
    }

    #[test]
    fn test_appearance_without_targets_still_yields_crop() {
        let processor = AppearanceProcessor::new(DEFAULT_MATCH_THRESHOLD);
        let frame = RgbImage::new(50, 50);
        let face = TrackedFace::new(FaceRect { x: 5, y: 5, width: 20, height: 20 });
        let result = processor.recognize(&face, &frame).unwrap();
        assert!(result.key.is_none());
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_feature_model_requires_constructed_model() {
        let processor = FeatureModelProcessor::new(0.5);
        let face = TrackedFace::new(FaceRect { x: 0, y: 0, width: 10, height: 10 });
        assert!(processor.recognize(&face, &RgbImage::new(10, 10)).is_none());
    }

    #[test]
    fn test_feature_model_matches_nearest_deformations() {
        let mut processor = FeatureModelProcessor::new(0.9);
        processor.set_target_faces(&[
            feature_target("Alice", &[("jaw", 1.0), ("brow", 0.0)]),
            feature_target("Bob", &[("jaw", 0.0), ("brow", 1.0)]),
            EnrollmentRecord::image_only("NoFeatures", GrayImage::new(100, 100)),
        ]);

        let face = face_with_model(&[("jaw", 0.1), ("brow", 0.9)]);
        let result = processor.recognize(&face, &RgbImage::new(10, 10)).unwrap();
        assert_eq!(result.matched_key(), Some("Bob"));
        match result.payload {
            MatchPayload::FeatureModel { hair_color, ref deformations, .. } => {
                assert_eq!(hair_color, RgbColor::new(10, 20, 30));
                assert_eq!(deformations.len(), 2);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_reference_factory_kinds() {
        let factory = ReferenceProcessors::default();
        for kind in ProcessorKind::ALL {
            assert_eq!(factory.create(kind).kind(), kind);
        }
    }
}
