pub const DEFAULT_IOU_THRESHOLD: f32 = 0.3;

/// A detected face: axis-aligned box in frame pixels plus detector confidence.
///
/// A face belongs to exactly one frame; its identity within a request is
/// `(frame_index, face_index)` where `face_index` is its position in the
/// detector's output for that frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Face {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
}

impl Face {
    pub fn new(x: f32, y: f32, width: f32, height: f32, score: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    /// Builds a face from corner coordinates `[x1, y1, x2, y2]`.
    pub fn from_corners(corners: [f32; 4], score: f32) -> Self {
        Self::new(
            corners[0],
            corners[1],
            corners[2] - corners[0],
            corners[3] - corners[1],
            score,
        )
    }

    pub fn corners(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Clips the box to a `width x height` frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Self {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let x1 = self.x.clamp(0.0, fw);
        let y1 = self.y.clamp(0.0, fh);
        let x2 = (self.x + self.width).clamp(0.0, fw);
        let y2 = (self.y + self.height).clamp(0.0, fh);
        Self::from_corners([x1, y1, x2, y2], self.score)
    }

    pub fn iou(&self, other: &Face) -> f32 {
        let a = self.corners();
        let b = other.corners();
        let ix1 = a[0].max(b[0]);
        let iy1 = a[1].max(b[1]);
        let ix2 = a[2].min(b[2]);
        let iy2 = a[3].min(b[3]);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Greedy non-maximum suppression: sorts by score and keeps a face only
    /// if its IoU with every previously-kept face is at or below the threshold.
    pub fn suppress_overlaps(faces: &[Face], iou_threshold: f32) -> Vec<Face> {
        let mut sorted = faces.to_vec();
        sorted.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut kept: Vec<Face> = Vec::with_capacity(sorted.len());
        for f in sorted {
            if kept.iter().all(|k| f.iou(k) <= iou_threshold) {
                kept.push(f);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn face(x: f32, y: f32, w: f32, h: f32) -> Face {
        Face::new(x, y, w, h, 0.9)
    }

    #[test]
    fn test_corners_round_trip() {
        let f = Face::from_corners([10.0, 20.0, 110.0, 70.0], 0.5);
        assert_relative_eq!(f.width, 100.0);
        assert_relative_eq!(f.height, 50.0);
        assert_eq!(f.corners(), [10.0, 20.0, 110.0, 70.0]);
        assert_eq!(f.center(), (60.0, 45.0));
    }

    #[test]
    fn test_iou_identical() {
        let a = face(10.0, 10.0, 100.0, 100.0);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 50*100 = 5000, union 15000
        let a = face(0.0, 0.0, 100.0, 100.0);
        let b = face(50.0, 0.0, 100.0, 100.0);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[rstest]
    #[case::disjoint(face(0.0, 0.0, 50.0, 50.0), face(100.0, 100.0, 50.0, 50.0))]
    #[case::touching(face(0.0, 0.0, 50.0, 50.0), face(50.0, 0.0, 50.0, 50.0))]
    #[case::zero_width(face(0.0, 0.0, 0.0, 100.0), face(0.0, 0.0, 50.0, 50.0))]
    fn test_iou_zero(#[case] a: Face, #[case] b: Face) {
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_clamp_to_frame() {
        let f = face(-10.0, 20.0, 100.0, 200.0).clamp_to(80, 100);
        assert_eq!(f.corners(), [0.0, 20.0, 80.0, 100.0]);
    }

    #[test]
    fn test_suppress_keeps_highest_score() {
        let faces = vec![
            Face::new(5.0, 5.0, 100.0, 100.0, 0.7),
            Face::new(0.0, 0.0, 100.0, 100.0, 0.9),
            Face::new(300.0, 300.0, 50.0, 50.0, 0.8),
        ];
        let kept = Face::suppress_overlaps(&faces, DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
        assert_relative_eq!(kept[0].score, 0.9);
        assert_relative_eq!(kept[1].score, 0.8);
    }

    #[test]
    fn test_suppress_empty() {
        assert!(Face::suppress_overlaps(&[], DEFAULT_IOU_THRESHOLD).is_empty());
    }
}
