//! Colour frame conversion: BGRA unpacking and PNG frame loading.

use image::RgbImage;
use std::path::Path;

/// Bytes per pixel of the tracking engine's BGRA colour stream.
const BGRA_BYTES_PER_PIXEL: usize = 4;

/// Convert a packed BGRA (8:8:8:8) buffer to an RGB image, dropping alpha.
///
/// The colour camera delivers pixels as [B, G, R, A]; anything past
/// `width * height * 4` bytes is ignored.
pub fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = width as usize * height as usize * BGRA_BYTES_PER_PIXEL;
    if bgra.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: bgra.len(),
        });
    }

    let rgb: Vec<u8> = bgra[..expected]
        .chunks_exact(BGRA_BYTES_PER_PIXEL)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();

    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: bgra.len(),
    })
}

/// Solid mid-gray frame, used when a scripted step has no image on disk.
pub fn blank_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, image::Rgb([128, 128, 128]))
}

/// Decode a colour frame from disk.
pub fn load_frame(path: &Path) -> Result<RgbImage, FrameError> {
    let img = image::open(path).map_err(|e| FrameError::Decode {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(img.to_rgb8())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid BGRA length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgb_swaps_channels() {
        // 2x1 image: [B=10, G=20, R=30, A=255], [B=40, G=50, R=60, A=0]
        let bgra = vec![10, 20, 30, 255, 40, 50, 60, 0];
        let rgb = bgra_to_rgb(&bgra, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(rgb.get_pixel(1, 0).0, [60, 50, 40]);
    }

    #[test]
    fn test_bgra_to_rgb_ignores_trailing_bytes() {
        let mut bgra = vec![0u8; 4 * 4];
        bgra.extend([1, 2, 3]);
        let rgb = bgra_to_rgb(&bgra, 2, 2).unwrap();
        assert_eq!(rgb.dimensions(), (2, 2));
    }

    #[test]
    fn test_bgra_invalid_length() {
        let bgra = vec![0u8; 7]; // too short for 2x1
        let result = bgra_to_rgb(&bgra, 2, 1);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn test_blank_frame_is_uniform() {
        let frame = blank_frame(8, 4);
        assert_eq!(frame.dimensions(), (8, 4));
        assert!(frame.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn test_load_frame_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_frame(&dir.path().join("nope.png"));
        assert!(matches!(result, Err(FrameError::Decode { .. })));
    }

    #[test]
    fn test_load_frame_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut img = blank_frame(3, 3);
        img.put_pixel(1, 1, image::Rgb([255, 0, 0]));
        img.save(&path).unwrap();

        let loaded = load_frame(&path).unwrap();
        assert_eq!(loaded, img);
    }
}
