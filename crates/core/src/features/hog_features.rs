use image::RgbImage;
use imageproc::hog::{hog, HogOptions};

use crate::detection::domain::face_classifier::FaceFeatures;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::features::face_aligner::align_face;
use crate::shared::constants::ALIGNED_FACE_SIZE;

pub const HOG_ORIENTATIONS: usize = 9;
pub const HOG_CELL_SIDE: usize = 8;
pub const HOG_BLOCK_SIDE: usize = 2;
pub const HOG_BLOCK_STRIDE: usize = 1;

pub fn hog_options() -> HogOptions {
    HogOptions::new(
        HOG_ORIENTATIONS,
        false,
        HOG_CELL_SIDE,
        HOG_BLOCK_SIDE,
        HOG_BLOCK_STRIDE,
    )
}

/// Descriptor length for a square crop of `side` pixels.
pub fn descriptor_len(side: u32) -> usize {
    let cells = side as usize / HOG_CELL_SIDE;
    let blocks = (cells - HOG_BLOCK_SIDE) / HOG_BLOCK_STRIDE + 1;
    blocks * blocks * HOG_BLOCK_SIDE * HOG_BLOCK_SIDE * HOG_ORIENTATIONS
}

/// HOG descriptor of the grayscale version of a crop.
pub fn hog_descriptor(crop: &RgbImage) -> Result<Vec<f32>, String> {
    let gray = image::imageops::grayscale(crop);
    hog(&gray, hog_options())
}

/// Aligns one face and computes its HOG features.
///
/// `Ok(None)` means the landmarks could not be aligned; the face gets a
/// sentinel slot rather than failing the request.
pub fn extract_face_features(
    frame_image: &RgbImage,
    landmarks: &FaceLandmarks,
) -> Result<Option<FaceFeatures>, String> {
    let Some(aligned) = align_face(frame_image, landmarks, ALIGNED_FACE_SIZE) else {
        return Ok(None);
    };
    let descriptor = hog_descriptor(&aligned.image)?;
    Ok(Some(FaceFeatures {
        hog: descriptor,
        aligned_landmarks: aligned.landmarks,
    }))
}
