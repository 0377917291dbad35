//! In-memory set of enrolled targets for the active processor.

use crate::processor::RecognitionProcessor;
use crate::types::EnrollmentRecord;

/// Minimum number of targets before the active processor is given them.
/// A single sample cannot discriminate between faces.
pub const MIN_TARGETS_FOR_RECOGNITION: usize = 2;

/// Ordered enrolled targets; append-only within a session, replaced
/// wholesale on processor switch.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    records: Vec<EnrollmentRecord>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: EnrollmentRecord) {
        self.records.push(record);
    }

    pub fn reset(&mut self, records: Vec<EnrollmentRecord>) {
        self.records = records;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EnrollmentRecord] {
        &self.records
    }

    /// Hand the full target set to `processor` if there are enough targets
    /// to recognize against. Returns whether the push happened.
    pub fn push_to(&self, processor: &mut dyn RecognitionProcessor) -> bool {
        if self.records.len() < MIN_TARGETS_FOR_RECOGNITION {
            return false;
        }
        processor.set_target_faces(&self.records);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchResult, ProcessorKind};
    use image::{GrayImage, RgbImage};
    use kinface_sensor::TrackedFace;

    #[derive(Default)]
    struct Recording {
        pushes: Vec<usize>,
    }

    impl RecognitionProcessor for Recording {
        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Appearance
        }

        fn set_target_faces(&mut self, targets: &[EnrollmentRecord]) {
            self.pushes.push(targets.len());
        }

        fn recognize(&self, _: &TrackedFace, _: &RgbImage) -> Option<MatchResult> {
            None
        }
    }

    fn record(label: &str) -> EnrollmentRecord {
        EnrollmentRecord::image_only(label, GrayImage::new(100, 100))
    }

    #[test]
    fn test_no_push_at_zero_or_one() {
        let mut registry = TargetRegistry::new();
        let mut processor = Recording::default();

        assert!(!registry.push_to(&mut processor));
        registry.add(record("Face 1"));
        assert!(!registry.push_to(&mut processor));
        assert!(processor.pushes.is_empty());
    }

    #[test]
    fn test_push_full_set_above_threshold() {
        let mut registry = TargetRegistry::new();
        let mut processor = Recording::default();

        for i in 1..=4 {
            registry.add(record(&format!("Face {i}")));
            registry.push_to(&mut processor);
        }
        assert_eq!(processor.pushes, vec![2, 3, 4]);
    }

    #[test]
    fn test_reset_replaces_and_preserves_order() {
        let mut registry = TargetRegistry::new();
        registry.add(record("old"));
        registry.reset(vec![record("b"), record("a")]);
        let labels: Vec<&str> = registry.records().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a"]);

        registry.reset(Vec::new());
        assert!(registry.is_empty());
    }
}
