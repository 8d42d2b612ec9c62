use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container-reported frame count; 0 when the container does not say.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Number of frames a `skip_frames` stride emits from this video.
    pub fn sampled_frames(&self, skip_frames: usize) -> usize {
        expected_sample_count(self.total_frames, skip_frames)
    }
}

/// Frames emitted when keeping decoded frames `0, S, 2S, ...` out of `total`.
pub fn expected_sample_count(total: usize, skip_frames: usize) -> usize {
    let stride = skip_frames.max(1);
    total.div_ceil(stride)
}
