//! Turning an armed frame into an enrollment record.

use crate::crop;
use crate::types::{EnrollmentRecord, MatchPayload, MatchResult, ProcessorKind};
use image::RgbImage;
use kinface_sensor::TrackedFace;

/// Build the record for one captured face.
///
/// The sample image is the strategy's own crop when it produced one,
/// otherwise the face box cut from the source frame. Colour and deformation
/// features are copied only under the feature-model strategy.
pub fn build_record(
    kind: ProcessorKind,
    label: &str,
    face: &TrackedFace,
    recognition: Option<&MatchResult>,
    frame: &RgbImage,
) -> EnrollmentRecord {
    let payload = recognition.map(|r| &r.payload);

    let image = match payload {
        Some(MatchPayload::Appearance { image }) => image.clone(),
        _ => crop::crop_face(frame, &face.rect),
    };
    let mut record = EnrollmentRecord::image_only(label, image);

    if kind.is_feature_rich() {
        if let Some(MatchPayload::FeatureModel {
            hair_color,
            skin_color,
            deformations,
        }) = payload
        {
            record.hair_color = Some(*hair_color);
            record.skin_color = Some(*skin_color);
            record.deformations = Some(deformations.clone());
        }
    }

    record
}

/// Next default label after the registry reaches `count` targets.
///
/// Plain substring replacement of every occurrence of `count` with
/// `count + 1`: "Face 1" at count 1 becomes "Face 2", "Unnamed" stays put.
pub fn advance_label(label: &str, count: usize) -> String {
    label.replace(&count.to_string(), &(count + 1).to_string())
}
