//! Landmark-based face alignment.
//!
//! Estimates the similarity transform (rotation, uniform scale, translation)
//! that maps five landmark anchors onto a fixed template, then warps the
//! frame into a square crop. Aligned landmarks come out of the same
//! transform, so features computed from the crop and the points agree.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra::{Matrix2, Vector2};

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::constants::ALIGNED_FACE_SIZE;

/// Anchor positions in a 112x112 crop: eye centers, nose tip, mouth corners.
const REFERENCE_ANCHORS: [(f64, f64); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// `x' = a*x - b*y + tx`, `y' = b*x + a*y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityTransform {
    a: f64,
    b: f64,
    tx: f64,
    ty: f64,
}

impl SimilarityTransform {
    /// Least-squares similarity from `src` onto `dst` (Umeyama).
    ///
    /// Returns `None` for fewer than two pairs, mismatched lengths or
    /// degenerate (collapsed) source points.
    pub fn estimate(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Self> {
        if src.len() != dst.len() || src.len() < 2 {
            return None;
        }
        let n = src.len() as f64;
        let to_vec = |p: &(f64, f64)| Vector2::new(p.0, p.1);

        let mean_src = src.iter().map(to_vec).sum::<Vector2<f64>>() / n;
        let mean_dst = dst.iter().map(to_vec).sum::<Vector2<f64>>() / n;

        let mut cov = Matrix2::zeros();
        let mut src_var = 0.0;
        for (s, d) in src.iter().zip(dst) {
            let sc = to_vec(s) - mean_src;
            let dc = to_vec(d) - mean_dst;
            cov += dc * sc.transpose();
            src_var += sc.norm_squared();
        }
        cov /= n;
        src_var /= n;
        if src_var <= f64::EPSILON {
            return None;
        }

        let svd = cov.svd(true, true);
        let u = svd.u?;
        let v_t = svd.v_t?;
        let mut d = Matrix2::identity();
        if u.determinant() * v_t.determinant() < 0.0 {
            d[(1, 1)] = -1.0;
        }
        let rotation = u * d * v_t;
        let scale = (Matrix2::from_diagonal(&svd.singular_values) * d).trace() / src_var;
        let t = mean_dst - scale * rotation * mean_src;

        Some(Self {
            a: scale * rotation[(0, 0)],
            b: scale * rotation[(1, 0)],
            tx: t.x,
            ty: t.y,
        })
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        let (x, y) = (x as f64, y as f64);
        (
            (self.a * x - self.b * y + self.tx) as f32,
            (self.b * x + self.a * y + self.ty) as f32,
        )
    }

    pub fn scale(&self) -> f64 {
        self.a.hypot(self.b)
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }

    fn projection(&self) -> Option<Projection> {
        Projection::from_matrix([
            self.a as f32,
            -self.b as f32,
            self.tx as f32,
            self.b as f32,
            self.a as f32,
            self.ty as f32,
            0.0,
            0.0,
            1.0,
        ])
    }
}

/// A `size x size` crop with the face's anchors on the template.
#[derive(Clone, Debug)]
pub struct AlignedFace {
    pub image: RgbImage,
    pub landmarks: FaceLandmarks,
}

/// Template anchors scaled to a crop side.
pub fn reference_anchors(size: u32) -> [(f64, f64); 5] {
    let k = size as f64 / ALIGNED_FACE_SIZE as f64;
    REFERENCE_ANCHORS.map(|(x, y)| (x * k, y * k))
}

/// Warps `image` so the face described by `landmarks` fills a `size` crop.
///
/// Returns `None` when the landmarks are not finite or collapse to a point.
pub fn align_face(image: &RgbImage, landmarks: &FaceLandmarks, size: u32) -> Option<AlignedFace> {
    if !landmarks.is_finite() {
        return None;
    }
    let src = landmarks
        .alignment_anchors()
        .map(|(x, y)| (x as f64, y as f64));
    let transform = SimilarityTransform::estimate(&src, &reference_anchors(size))?;
    let projection = transform.projection()?;

    let mut out = RgbImage::new(size, size);
    warp_into(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut out);

    Some(AlignedFace {
        image: out,
        landmarks: landmarks.map(|p| transform.apply(p)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transformed(points: &[(f64, f64)], scale: f64, angle_deg: f64, t: (f64, f64)) -> Vec<(f64, f64)> {
        let (s, c) = angle_deg.to_radians().sin_cos();
        points
            .iter()
            .map(|&(x, y)| {
                (
                    scale * (c * x - s * y) + t.0,
                    scale * (s * x + c * y) + t.1,
                )
            })
            .collect()
    }

    #[test]
    fn test_estimate_recovers_known_transform() {
        let src = REFERENCE_ANCHORS.to_vec();
        let dst = transformed(&src, 2.0, 15.0, (30.0, -12.0));
        let tf = SimilarityTransform::estimate(&src, &dst).unwrap();
        assert_relative_eq!(tf.scale(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(tf.rotation_degrees(), 15.0, epsilon = 1e-9);
        let (x, y) = tf.apply((src[0].0 as f32, src[0].1 as f32));
        assert_relative_eq!(x as f64, dst[0].0, epsilon = 1e-3);
        assert_relative_eq!(y as f64, dst[0].1, epsilon = 1e-3);
    }

    #[test]
    fn test_estimate_rejects_degenerate_input() {
        let src = vec![(5.0, 5.0); 5];
        assert!(SimilarityTransform::estimate(&src, &REFERENCE_ANCHORS).is_none());
        assert!(SimilarityTransform::estimate(&REFERENCE_ANCHORS[..2], &REFERENCE_ANCHORS).is_none());
    }

    #[test]
    fn test_reference_anchors_scale_with_size() {
        let anchors = reference_anchors(224);
        assert_relative_eq!(anchors[2].0, 112.0504, epsilon = 1e-4);
    }

    /// Landmarks whose anchors sit on the template scaled by 2 and shifted.
    fn landmarks_on_template() -> FaceLandmarks {
        let mut pts = vec![(0.0f32, 0.0f32); 68];
        let anchors = transformed(&REFERENCE_ANCHORS, 2.0, 0.0, (100.0, 50.0));
        for i in 36..42 {
            pts[i] = (anchors[0].0 as f32, anchors[0].1 as f32);
        }
        for i in 42..48 {
            pts[i] = (anchors[1].0 as f32, anchors[1].1 as f32);
        }
        pts[30] = (anchors[2].0 as f32, anchors[2].1 as f32);
        pts[48] = (anchors[3].0 as f32, anchors[3].1 as f32);
        pts[54] = (anchors[4].0 as f32, anchors[4].1 as f32);
        FaceLandmarks::new(pts).unwrap()
    }

    #[test]
    fn test_align_face_maps_anchors_to_template() {
        let image = RgbImage::from_pixel(400, 400, Rgb([200, 100, 50]));
        let aligned = align_face(&image, &landmarks_on_template(), 112).unwrap();
        assert_eq!(aligned.image.dimensions(), (112, 112));
        let nose = aligned.landmarks.point(30);
        assert_relative_eq!(nose.0, 56.0252, epsilon = 1e-2);
        assert_relative_eq!(nose.1, 71.7366, epsilon = 1e-2);
        let px = aligned.image.get_pixel(56, 56);
        assert!((px[0] as i32 - 200).abs() <= 1);
        assert!((px[2] as i32 - 50).abs() <= 1);
    }

    #[test]
    fn test_align_face_rejects_non_finite_landmarks() {
        let image = RgbImage::new(10, 10);
        let lm = FaceLandmarks::new(vec![(f32::NAN, 0.0); 68]).unwrap();
        assert!(align_face(&image, &lm, 112).is_none());
    }
}
