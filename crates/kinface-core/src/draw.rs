//! Raster primitives for frame overlays.
//!
//! All coordinates are signed and clipped against the image, so callers can
//! pass face geometry that runs past the frame edge.

use image::{Rgb, RgbImage};

/// Glyph cell of the built-in caption font, in font pixels.
const GLYPH_W: i32 = 3;
const GLYPH_H: i32 = 5;

/// Fill an axis-aligned rectangle.
pub fn fill_rect(img: &mut RgbImage, x: i32, y: i32, width: i32, height: i32, color: Rgb<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = x.saturating_add(width).min(img.width() as i32);
    let y1 = y.saturating_add(height).min(img.height() as i32);

    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px as u32, py as u32, color);
        }
    }
}

/// Draw a line with a square pen of `thickness` pixels (Bresenham).
///
/// The segment is first clipped to the image grown by the pen width, so only
/// points that can touch the image are walked.
pub fn draw_line(
    img: &mut RgbImage,
    from: (i32, i32),
    to: (i32, i32),
    thickness: u32,
    color: Rgb<u8>,
) {
    let t = thickness.max(1) as i32;
    let half = t / 2;

    let margin = i64::from(t);
    let min = (-margin, -margin);
    let max = (i64::from(img.width()) - 1 + margin, i64::from(img.height()) - 1 + margin);
    let from = (i64::from(from.0), i64::from(from.1));
    let to = (i64::from(to.0), i64::from(to.1));
    let Some(((mut x, mut y), to)) = clip_segment(from, to, min, max) else {
        return;
    };

    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        // Clipped points lie within the grown image, so they fit in i32.
        fill_rect(img, x as i32 - half, y as i32 - half, t, t, color);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

type Point = (i64, i64);

/// Clip a segment to the box `min..=max` (Liang-Barsky). Segments already
/// inside are returned unchanged; `None` when the segment misses the box.
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    let inside = |p: Point| p.0 >= min.0 && p.0 <= max.0 && p.1 >= min.1 && p.1 <= max.1;
    if inside(from) && inside(to) {
        return Some((from, to));
    }

    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = ((to.0 - from.0) as f64, (to.1 - from.1) as f64);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    let edges = [
        (-dx, x0 - min.0 as f64),
        (dx, max.0 as f64 - x0),
        (-dy, y0 - min.1 as f64),
        (dy, max.1 as f64 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| {
        (
            ((x0 + t * dx).round() as i64).clamp(min.0, max.0),
            ((y0 + t * dy).round() as i64).clamp(min.1, max.1),
        )
    };
    Some((at(t0), at(t1)))
}

/// Draw a closed polygon outline.
pub fn draw_polygon(img: &mut RgbImage, points: &[(i32, i32)], thickness: u32, color: Rgb<u8>) {
    match points {
        [] => {}
        [p] => draw_line(img, *p, *p, thickness, color),
        _ => {
            for (i, &p) in points.iter().enumerate() {
                let next = points[(i + 1) % points.len()];
                draw_line(img, p, next, thickness, color);
            }
        }
    }
}

/// Render `text` with the built-in 3×5 caption font, each font pixel drawn
/// as a `scale`×`scale` block. Lowercase letters render as uppercase.
///
/// Returns the rendered width in image pixels.
pub fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, scale: u32, color: Rgb<u8>) -> i32 {
    let s = scale.max(1) as i32;
    let advance = (GLYPH_W + 1) * s;
    let mut cursor = x;

    for c in text.chars() {
        let rows = glyph(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                    let px = cursor.saturating_add(col * s);
                    let py = y.saturating_add(row as i32 * s);
                    fill_rect(img, px, py, s, s, color);
                }
            }
        }
        cursor = cursor.saturating_add(advance);
    }

    cursor.saturating_sub(x)
}

/// Height of a rendered caption line in image pixels.
pub fn text_height(scale: u32) -> i32 {
    GLYPH_H * scale.max(1) as i32
}

fn glyph(c: char) -> [u8; GLYPH_H as usize] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        ' ' => [0; 5],
        _ => [0b111, 0b001, 0b010, 0b000, 0b010],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn count(img: &RgbImage, color: Rgb<u8>) -> usize {
        img.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn test_fill_rect_exact_area() {
        let mut img = RgbImage::new(20, 20);
        fill_rect(&mut img, 2, 3, 4, 5, RED);
        assert_eq!(count(&img, RED), 20);
        assert_eq!(*img.get_pixel(2, 3), RED);
        assert_eq!(*img.get_pixel(5, 7), RED);
        assert_ne!(*img.get_pixel(6, 7), RED);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut img = RgbImage::new(10, 10);
        fill_rect(&mut img, -5, -5, 8, 8, RED);
        assert_eq!(count(&img, RED), 9);
        fill_rect(&mut img, 50, 50, 8, 8, RED);
        assert_eq!(count(&img, RED), 9);
    }

    #[test]
    fn test_horizontal_line_thickness() {
        let mut img = RgbImage::new(30, 30);
        draw_line(&mut img, (5, 10), (14, 10), 1, RED);
        assert_eq!(count(&img, RED), 10);

        let mut thick = RgbImage::new(30, 30);
        draw_line(&mut thick, (5, 10), (14, 10), 5, RED);
        // 10 stamps of 5x5 sliding one pixel: 14 columns x 5 rows
        assert_eq!(count(&thick, RED), 14 * 5);
    }

    #[test]
    fn test_far_line_is_clipped_to_image() {
        let mut img = RgbImage::new(20, 20);
        draw_line(&mut img, (-1_000_000_000, 5), (1_000_000_000, 5), 1, RED);
        assert_eq!(count(&img, RED), 20);
        assert!((0..20).all(|x| *img.get_pixel(x, 5) == RED));
    }

    #[test]
    fn test_extreme_endpoints_do_not_overflow() {
        let mut img = RgbImage::new(20, 20);
        draw_line(&mut img, (i32::MIN, i32::MIN), (i32::MAX, i32::MAX), 1, RED);
        // The diagonal crosses the image corner to corner.
        assert_eq!(*img.get_pixel(0, 0), RED);
        assert_eq!(*img.get_pixel(19, 19), RED);

        let mut untouched = RgbImage::new(20, 20);
        draw_line(&mut untouched, (i32::MIN, 100), (i32::MAX, 100), 5, RED);
        draw_line(&mut untouched, (i32::MAX, i32::MIN), (i32::MAX, i32::MAX), 5, RED);
        assert_eq!(count(&untouched, RED), 0);
    }

    #[test]
    fn test_clip_keeps_inside_segment() {
        let seg = clip_segment((1, 2), (8, 9), (0, 0), (10, 10));
        assert_eq!(seg, Some(((1, 2), (8, 9))));
        assert_eq!(clip_segment((20, 0), (30, 10), (0, 0), (10, 10)), None);
        assert_eq!(clip_segment((-10, 5), (5, 5), (0, 0), (10, 10)), Some(((0, 5), (5, 5))));
    }

    #[test]
    fn test_polygon_is_closed() {
        let mut img = RgbImage::new(20, 20);
        draw_polygon(&mut img, &[(2, 2), (12, 2), (12, 12), (2, 12)], 1, RED);
        // Perimeter of an 11x11 square outline
        assert_eq!(count(&img, RED), 40);
        assert_eq!(*img.get_pixel(2, 7), RED);
    }

    #[test]
    fn test_empty_polygon_draws_nothing() {
        let mut img = RgbImage::new(5, 5);
        draw_polygon(&mut img, &[], 5, RED);
        assert_eq!(count(&img, RED), 0);
    }

    #[test]
    fn test_text_width_and_pixels() {
        let mut img = RgbImage::new(100, 40);
        let width = draw_text(&mut img, 0, 0, "1:", 2, RED);
        assert_eq!(width, 16);
        // '1' has 8 lit font pixels, ':' has 2; each is 2x2
        assert_eq!(count(&img, RED), (8 + 2) * 4);
        assert_eq!(text_height(2), 10);
    }

    #[test]
    fn test_lowercase_matches_uppercase() {
        assert_eq!(glyph('f'), glyph('F'));
    }
}
