/// Head pose from 2D landmarks and a canonical 3D face model.
///
/// Fits a scaled-orthographic camera to six landmark correspondences by
/// least squares, orthonormalizes the recovered rotation with an SVD and
/// decomposes it into pitch, roll and yaw. No camera intrinsics are needed,
/// so the result does not depend on frame size.
use nalgebra::{Matrix2x6, Matrix3, Matrix3x6, RowVector3, Vector3};

use crate::detection::domain::face_landmarks::{
    FaceLandmarks, CHIN, LEFT_EYE_OUTER, MOUTH_LEFT, MOUTH_RIGHT, NOSE_TIP, RIGHT_EYE_OUTER,
};
use crate::detection::domain::head_pose::{HeadPose, LandmarkPoseEstimator};
use crate::shared::frame::Frame;

/// Landmark indices matched against [`MODEL_POINTS`], in the same order.
const CORRESPONDENCES: [usize; 6] = [
    NOSE_TIP,
    CHIN,
    LEFT_EYE_OUTER,
    RIGHT_EYE_OUTER,
    MOUTH_LEFT,
    MOUTH_RIGHT,
];

/// Generic face model, y up, nose tip at the origin.
const MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, -330.0, -65.0],
    [-225.0, 170.0, -135.0],
    [225.0, 170.0, -135.0],
    [-150.0, -150.0, -125.0],
    [150.0, -150.0, -125.0],
];

#[derive(Clone, Copy, Debug, Default)]
pub struct PnpPoseEstimator;

impl PnpPoseEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl LandmarkPoseEstimator for PnpPoseEstimator {
    fn estimate(
        &mut self,
        _frames: &[Frame],
        landmarks: &[Vec<Option<FaceLandmarks>>],
    ) -> Result<Vec<Vec<Option<HeadPose>>>, Box<dyn std::error::Error>> {
        Ok(landmarks
            .iter()
            .map(|per_frame| {
                per_frame
                    .iter()
                    .map(|lm| lm.as_ref().and_then(estimate_pose))
                    .collect()
            })
            .collect())
    }
}

/// Solves pose for one landmark set; `None` for degenerate input.
pub fn estimate_pose(landmarks: &FaceLandmarks) -> Option<HeadPose> {
    if !landmarks.is_finite() {
        return None;
    }

    let mut model = Matrix3x6::<f64>::zeros();
    let mut image = Matrix2x6::<f64>::zeros();
    for (col, (&idx, p)) in CORRESPONDENCES.iter().zip(MODEL_POINTS.iter()).enumerate() {
        let (u, v) = landmarks.point(idx);
        model.set_column(col, &Vector3::new(p[0], p[1], p[2]));
        // Flip image y so both frames are y-up.
        image[(0, col)] = u as f64;
        image[(1, col)] = -(v as f64);
    }

    let model_mean = model.column_mean();
    let image_mean = image.column_mean();
    for mut c in model.column_iter_mut() {
        c -= &model_mean;
    }
    for mut c in image.column_iter_mut() {
        c -= &image_mean;
    }

    let normal = (model * model.transpose()).try_inverse()?;
    let projection = image * model.transpose() * normal;

    let r1: RowVector3<f64> = projection.row(0).into_owned();
    let r2: RowVector3<f64> = projection.row(1).into_owned();
    if r1.norm() <= f64::EPSILON || r2.norm() <= f64::EPSILON {
        return None;
    }
    let r1 = r1.normalize();
    let r2 = r2.normalize();
    let r3 = r1.cross(&r2);

    let approx = Matrix3::from_rows(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let mut rotation = svd.u? * svd.v_t?;
    if rotation.determinant() < 0.0 {
        rotation = -rotation;
    }

    Some(euler_degrees(&rotation))
}

/// Decomposes `R = Rz(roll) * Ry(yaw) * Rx(pitch)`.
fn euler_degrees(r: &Matrix3<f64>) -> HeadPose {
    let yaw = (-r[(2, 0)]).clamp(-1.0, 1.0).asin();
    let pitch = r[(2, 1)].atan2(r[(2, 2)]);
    let roll = r[(1, 0)].atan2(r[(0, 0)]);
    HeadPose::new(
        pitch.to_degrees() as f32,
        roll.to_degrees() as f32,
        yaw.to_degrees() as f32,
    )
}
