use image::GrayImage;
use kinface_sensor::RgbColor;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Side length of the square grayscale sample stored with every enrollment.
pub const TARGET_IMAGE_SIZE: u32 = 100;

/// Shape deformation magnitudes keyed by deformation kind.
pub type Deformations = BTreeMap<String, f32>;

/// Which recognition strategy is active.
///
/// The two strategies are mutually exclusive and each owns a partition of
/// the enrollment store, identified by metadata file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    /// Feature-rich strategy built on the tracker's constructed face model
    /// (hair/skin colour plus shape deformations).
    FeatureModel,
    /// Appearance strategy comparing normalized grayscale face crops.
    Appearance,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 2] = [ProcessorKind::FeatureModel, ProcessorKind::Appearance];

    /// Metadata file suffix for this strategy's partition, including the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            ProcessorKind::FeatureModel => ".fmb",
            ProcessorKind::Appearance => ".pca",
        }
    }

    /// Whether records from this strategy carry colour and deformation features.
    pub fn is_feature_rich(self) -> bool {
        matches!(self, ProcessorKind::FeatureModel)
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcessorKind::FeatureModel => "feature-model",
            ProcessorKind::Appearance => "appearance",
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown processor '{0}' (expected feature-model or appearance)")]
pub struct UnknownProcessor(pub String);

impl FromStr for ProcessorKind {
    type Err = UnknownProcessor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feature-model" | "featuremodel" | "fmb" => Ok(ProcessorKind::FeatureModel),
            "appearance" | "eigen" | "pca" => Ok(ProcessorKind::Appearance),
            _ => Err(UnknownProcessor(s.to_string())),
        }
    }
}

/// A persisted reference sample used for later face matching.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub label: String,
    /// Grayscale sample, `TARGET_IMAGE_SIZE` square.
    pub image: GrayImage,
    pub hair_color: Option<RgbColor>,
    pub skin_color: Option<RgbColor>,
    pub deformations: Option<Deformations>,
}

impl EnrollmentRecord {
    /// A record carrying only an image, as produced by the appearance strategy.
    pub fn image_only(label: impl Into<String>, image: GrayImage) -> Self {
        Self {
            label: label.into(),
            image,
            hair_color: None,
            skin_color: None,
            deformations: None,
        }
    }

    pub fn has_features(&self) -> bool {
        self.hair_color.is_some() || self.skin_color.is_some() || self.deformations.is_some()
    }
}

/// Strategy-specific data attached to a match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPayload {
    /// The normalized crop the appearance strategy compared.
    Appearance { image: GrayImage },
    /// Features read off the constructed face model.
    FeatureModel {
        hair_color: RgbColor,
        skin_color: RgbColor,
        deformations: Deformations,
    },
}

/// Per-face output of a recognition strategy for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Label of the best enrolled target, if one matched.
    pub key: Option<String>,
    /// Similarity of the best target; 0 when nothing was compared.
    pub score: f32,
    pub payload: MatchPayload,
}

impl MatchResult {
    /// Non-empty match key, if any.
    pub fn matched_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_partitions() {
        assert_eq!(ProcessorKind::FeatureModel.suffix(), ".fmb");
        assert_eq!(ProcessorKind::Appearance.suffix(), ".pca");
        assert!(ProcessorKind::FeatureModel.is_feature_rich());
        assert!(!ProcessorKind::Appearance.is_feature_rich());
    }

    #[test]
    fn test_parse_processor_names() {
        assert_eq!("feature-model".parse::<ProcessorKind>().unwrap(), ProcessorKind::FeatureModel);
        assert_eq!("FMB".parse::<ProcessorKind>().unwrap(), ProcessorKind::FeatureModel);
        assert_eq!(" appearance ".parse::<ProcessorKind>().unwrap(), ProcessorKind::Appearance);
        assert_eq!("pca".parse::<ProcessorKind>().unwrap(), ProcessorKind::Appearance);
        assert!("lbph".parse::<ProcessorKind>().is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for kind in ProcessorKind::ALL {
            assert_eq!(kind.to_string().parse::<ProcessorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_matched_key_ignores_empty() {
        let mut result = MatchResult {
            key: Some(String::new()),
            score: 0.5,
            payload: MatchPayload::Appearance { image: GrayImage::new(1, 1) },
        };
        assert_eq!(result.matched_key(), None);
        result.key = Some("Face 1".into());
        assert_eq!(result.matched_key(), Some("Face 1"));
    }
}
