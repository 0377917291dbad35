//! Face sample extraction.
//!
//! Cuts the tracked face rectangle out of a colour frame and normalizes it
//! to the fixed-size grayscale sample stored with enrollments.

use crate::types::TARGET_IMAGE_SIZE;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use kinface_sensor::FaceRect;

/// Crop `rect` out of `frame`, convert to grayscale, resize to the target
/// sample size and stretch its contrast.
///
/// The rectangle is clipped to the frame. A face box entirely outside the
/// frame yields a black sample.
pub fn crop_face(frame: &RgbImage, rect: &FaceRect) -> GrayImage {
    let Some((x, y, w, h)) = clip_rect(rect, frame.width(), frame.height()) else {
        return GrayImage::new(TARGET_IMAGE_SIZE, TARGET_IMAGE_SIZE);
    };

    let region = imageops::crop_imm(frame, x, y, w, h).to_image();
    let gray = imageops::grayscale(&region);
    let mut sample = imageops::resize(&gray, TARGET_IMAGE_SIZE, TARGET_IMAGE_SIZE, FilterType::Triangle);
    stretch_contrast(&mut sample);
    sample
}

/// Intersect a signed face rectangle with the frame bounds.
fn clip_rect(rect: &FaceRect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.left().clamp(0, width as i32);
    let y0 = rect.top().clamp(0, height as i32);
    let x1 = rect.right().clamp(0, width as i32);
    let y1 = rect.bottom().clamp(0, height as i32);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

/// Linear min/max stretch to the full 0–255 range, in place.
///
/// Flat images are left untouched.
pub fn stretch_contrast(gray: &mut GrayImage) {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if max <= min {
        return;
    }

    let range = (max - min) as f32;
    for p in gray.pixels_mut() {
        let v = (p.0[0] - min) as f32 / range * 255.0;
        p.0[0] = v.round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_crop_output_size() {
        let frame = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
        let rect = FaceRect { x: 100, y: 50, width: 37, height: 61 };
        let sample = crop_face(&frame, &rect);
        assert_eq!(sample.dimensions(), (TARGET_IMAGE_SIZE, TARGET_IMAGE_SIZE));
    }

    #[test]
    fn test_crop_outside_frame_is_black() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        let rect = FaceRect { x: -50, y: -50, width: 20, height: 20 };
        let sample = crop_face(&frame, &rect);
        assert!(sample.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_crop_is_clipped_to_frame() {
        assert_eq!(
            clip_rect(&FaceRect { x: -10, y: 5, width: 30, height: 100 }, 64, 48),
            Some((0, 5, 20, 43))
        );
        assert_eq!(clip_rect(&FaceRect { x: 70, y: 0, width: 10, height: 10 }, 64, 48), None);
    }

    #[test]
    fn test_crop_takes_face_region_only() {
        // Left half black, right half white; face box sits in the right half.
        let mut frame = RgbImage::new(100, 50);
        for (x, _, p) in frame.enumerate_pixels_mut() {
            *p = if x >= 50 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) };
        }
        let sample = crop_face(&frame, &FaceRect { x: 60, y: 10, width: 20, height: 20 });
        // Flat region: no stretch, stays white.
        assert!(sample.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_stretch_contrast_full_range() {
        let mut gray = GrayImage::from_fn(4, 1, |x, _| Luma([100 + x as u8 * 10]));
        stretch_contrast(&mut gray);
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
        assert_eq!(gray.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn test_stretch_contrast_flat_unchanged() {
        let mut gray = GrayImage::from_pixel(3, 3, Luma([42]));
        stretch_contrast(&mut gray);
        assert!(gray.pixels().all(|p| p.0[0] == 42));
    }
}
