//! 68-point facial landmarks in the iBUG layout.
//!
//! Points are stored in frame pixel coordinates. Index ranges follow the
//! standard annotation: jaw 0-16, brows 17-26, nose 27-35, eyes 36-47,
//! mouth 48-67.

use std::ops::Range;

use crate::shared::constants::NUM_LANDMARKS;

pub const CHIN: usize = 8;
pub const NOSE_TIP: usize = 30;
pub const LEFT_EYE_OUTER: usize = 36;
pub const RIGHT_EYE_OUTER: usize = 45;
pub const MOUTH_LEFT: usize = 48;
pub const MOUTH_RIGHT: usize = 54;

const LEFT_EYE: Range<usize> = 36..42;
const RIGHT_EYE: Range<usize> = 42..48;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f32, f32)>) -> Result<Self, &'static str> {
        if points.len() != NUM_LANDMARKS {
            return Err("landmark set must contain exactly 68 points");
        }
        Ok(Self { points })
    }

    /// Builds landmarks from interleaved `[x0, y0, x1, y1, ...]` values.
    pub fn from_interleaved(values: &[f32]) -> Result<Self, &'static str> {
        if values.len() != NUM_LANDMARKS * 2 {
            return Err("interleaved landmark buffer must contain 136 values");
        }
        Self::new(values.chunks_exact(2).map(|p| (p[0], p[1])).collect())
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    pub fn point(&self, index: usize) -> (f32, f32) {
        self.points[index]
    }

    pub fn xs(&self) -> impl Iterator<Item = f32> + '_ {
        self.points.iter().map(|p| p.0)
    }

    pub fn ys(&self) -> impl Iterator<Item = f32> + '_ {
        self.points.iter().map(|p| p.1)
    }

    pub fn left_eye_center(&self) -> (f32, f32) {
        self.mean_of(LEFT_EYE)
    }

    pub fn right_eye_center(&self) -> (f32, f32) {
        self.mean_of(RIGHT_EYE)
    }

    /// Eye centers, nose tip and mouth corners, the anchors used for alignment.
    pub fn alignment_anchors(&self) -> [(f32, f32); 5] {
        [
            self.left_eye_center(),
            self.right_eye_center(),
            self.points[NOSE_TIP],
            self.points[MOUTH_LEFT],
            self.points[MOUTH_RIGHT],
        ]
    }

    /// Applies a point mapping to every landmark.
    pub fn map(&self, f: impl Fn((f32, f32)) -> (f32, f32)) -> Self {
        Self {
            points: self.points.iter().copied().map(f).collect(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|(x, y)| x.is_finite() && y.is_finite())
    }

    fn mean_of(&self, range: Range<usize>) -> (f32, f32) {
        let n = range.len() as f32;
        let (sx, sy) = self.points[range]
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    }
}
