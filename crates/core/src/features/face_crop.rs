use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// A resized face crop and the frame rectangle it was cut from.
#[derive(Clone, Debug)]
pub struct SquareCrop {
    pub image: RgbImage,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SquareCrop {
    /// Maps crop-normalized coordinates (`0..1` on both axes) back to frame pixels.
    pub fn to_frame(&self, nx: f32, ny: f32) -> (f32, f32) {
        (self.x + nx * self.width, self.y + ny * self.height)
    }
}

/// Square crop centered on the face box, clipped to the frame and resized
/// to `size x size`.
///
/// Returns `None` when the clipped crop is empty (box fully outside the
/// frame, zero-sized box) or the frame is not RGB.
pub fn square_face_crop(frame: &Frame, face: &Face, size: u32) -> Option<SquareCrop> {
    if frame.channels() != 3 || size == 0 {
        return None;
    }
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;

    let (cx, cy) = face.center();
    let half = face.width.max(face.height) / 2.0;
    if !(half.is_finite() && cx.is_finite() && cy.is_finite()) {
        return None;
    }

    let x1 = (cx - half).max(0.0).floor() as u32;
    let y1 = (cy - half).max(0.0).floor() as u32;
    let x2 = (cx + half).min(fw).ceil() as u32;
    let y2 = (cy + half).min(fh).ceil() as u32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let crop_w = x2 - x1;
    let crop_h = y2 - y1;
    let src = frame.as_ndarray();
    let mut data = Vec::with_capacity((crop_w * crop_h * 3) as usize);
    for row in y1 as usize..y2 as usize {
        for col in x1 as usize..x2 as usize {
            for c in 0..3 {
                data.push(src[[row, col, c]]);
            }
        }
    }

    let crop = RgbImage::from_raw(crop_w, crop_h, data)?;
    Some(SquareCrop {
        image: imageops::resize(&crop, size, size, FilterType::Triangle),
        x: x1 as f32,
        y: y1 as f32,
        width: crop_w as f32,
        height: crop_h as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_marker() -> Frame {
        // 100x80 gray frame with a white 10x10 block at (40, 30)
        let mut img = RgbImage::from_pixel(100, 80, image::Rgb([128, 128, 128]));
        for y in 30..40 {
            for x in 40..50 {
                img.put_pixel(x, y, image::Rgb([255, 255, 255]));
            }
        }
        Frame::from_rgb_image(img, 0)
    }

    #[test]
    fn test_crop_is_square_and_resized() {
        let face = Face::new(40.0, 30.0, 10.0, 10.0, 0.9);
        let crop = square_face_crop(&frame_with_marker(), &face, 48).unwrap();
        assert_eq!(crop.image.dimensions(), (48, 48));
        assert_eq!(crop.image.get_pixel(24, 24), &image::Rgb([255, 255, 255]));
        assert_eq!(crop.to_frame(0.5, 0.5), (45.0, 35.0));
    }

    #[test]
    fn test_crop_clipped_at_border() {
        let face = Face::new(-20.0, -20.0, 40.0, 40.0, 0.9);
        let crop = square_face_crop(&frame_with_marker(), &face, 32).unwrap();
        assert_eq!((crop.x, crop.y), (0.0, 0.0));
        assert_eq!((crop.width, crop.height), (20.0, 20.0));
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        let face = Face::new(500.0, 500.0, 20.0, 20.0, 0.9);
        assert!(square_face_crop(&frame_with_marker(), &face, 32).is_none());
    }

    #[test]
    fn test_crop_of_zero_size_box_is_none() {
        let face = Face::new(10.0, 10.0, 0.0, 0.0, 0.9);
        assert!(square_face_crop(&frame_with_marker(), &face, 32).is_none());
    }
}
