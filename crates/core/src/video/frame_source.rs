use std::path::{Path, PathBuf};

use crate::shared::error::InputError;
use crate::shared::frame::Frame;
use crate::video::infrastructure::image_loader::load_image;

/// Source name given to frames passed in memory without one.
pub const IN_MEMORY_SOURCE: &str = "frame";

/// One image for `detect_image`: a file to decode or an already decoded frame.
#[derive(Clone, Debug)]
pub enum ImageInput {
    Path(PathBuf),
    Frame(Frame),
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        ImageInput::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageInput {
    fn from(path: &str) -> Self {
        ImageInput::Path(PathBuf::from(path))
    }
}

impl From<Frame> for ImageInput {
    fn from(frame: Frame) -> Self {
        ImageInput::Frame(frame)
    }
}

/// Fails with the first path that does not exist, without decoding anything.
pub fn check_paths_exist(inputs: &[ImageInput]) -> Result<(), InputError> {
    for input in inputs {
        if let ImageInput::Path(path) = input {
            if !path.is_file() {
                return Err(InputError::NotFound(path.clone()));
            }
        }
    }
    Ok(())
}

/// Providers only accept RGB frames whose buffer matches their dimensions.
pub fn check_frame(frame: &Frame, position: usize) -> Result<(), InputError> {
    let invalid = |message: String| InputError::InvalidFrame { position, message };
    frame.check_layout().map_err(|e| invalid(e.to_string()))?;
    if frame.channels() != 3 {
        return Err(invalid(format!("expected 3 RGB channels, got {}", frame.channels())));
    }
    Ok(())
}

/// Decodes every input into a frame indexed by its list position.
pub fn load_frames(inputs: &[ImageInput]) -> Result<Vec<Frame>, InputError> {
    if inputs.is_empty() {
        return Err(InputError::Empty);
    }
    check_paths_exist(inputs)?;
    for (position, input) in inputs.iter().enumerate() {
        if let ImageInput::Frame(frame) = input {
            check_frame(frame, position)?;
        }
    }
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| match input {
            ImageInput::Path(path) => load_image(path, index),
            ImageInput::Frame(frame) => {
                let frame = frame.with_index(index);
                Ok(match frame.source() {
                    Some(_) => frame,
                    None => frame.with_source(IN_MEMORY_SOURCE),
                })
            }
        })
        .collect()
}

/// Keeps decoded frames `0, S, 2S, ...` of an underlying frame stream.
///
/// Indices are left as decoded, so the `frame` column reports positions in
/// the original video. The adapter is lazy and cannot be restarted.
pub struct StrideSampler<I> {
    inner: I,
    stride: usize,
    position: usize,
}

impl<I> StrideSampler<I> {
    pub fn new(inner: I, skip_frames: usize) -> Self {
        Self {
            inner,
            stride: skip_frames.max(1),
            position: 0,
        }
    }
}

impl<I, E> Iterator for StrideSampler<I>
where
    I: Iterator<Item = Result<Frame, E>>,
{
    type Item = Result<Frame, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.inner.next()?;
            let keep = self.position % self.stride == 0;
            self.position += 1;
            if keep || item.is_err() {
                return Some(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::video_metadata::expected_sample_count;
    use image::{Rgb, RgbImage};
    use rstest::rstest;
    use tempfile::TempDir;

    fn decoded(n: usize) -> impl Iterator<Item = Result<Frame, String>> {
        (0..n).map(|i| Ok(Frame::new(vec![0; 3], 1, 1, 3, i)))
    }

    #[rstest]
    #[case(72, 24)]
    #[case(72, 20)]
    #[case(10, 1)]
    #[case(5, 10)]
    #[case(7, 0)]
    fn test_stride_sample_count(#[case] total: usize, #[case] skip: usize) {
        let sampled: Vec<Frame> = StrideSampler::new(decoded(total), skip)
            .map(Result::unwrap)
            .collect();
        assert_eq!(sampled.len(), expected_sample_count(total, skip));
    }

    #[test]
    fn test_stride_keeps_decoded_indices() {
        let indices: Vec<usize> = StrideSampler::new(decoded(72), 24)
            .map(|f| f.unwrap().index())
            .collect();
        assert_eq!(indices, vec![0, 24, 48]);
    }

    #[test]
    fn test_decode_errors_pass_through() {
        let stream = vec![
            Ok(Frame::new(vec![0; 3], 1, 1, 3, 0)),
            Err("bad packet".to_string()),
        ];
        let items: Vec<_> = StrideSampler::new(stream.into_iter(), 5).collect();
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[test]
    fn test_load_frames_indexes_by_position() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.png");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&path).unwrap();
        let memory = Frame::new(vec![9; 12], 2, 2, 3, 42);

        let frames = load_frames(&[ImageInput::from(path.as_path()), ImageInput::from(memory)]).unwrap();
        assert_eq!(frames[0].index(), 0);
        assert_eq!(frames[1].index(), 1);
        assert_eq!(frames[1].source(), Some(IN_MEMORY_SOURCE));
    }

    #[test]
    fn test_missing_path_fails_before_decoding_others() {
        let tmp = TempDir::new().unwrap();
        let broken = tmp.path().join("broken.png");
        std::fs::write(&broken, b"garbage").unwrap();
        let missing = tmp.path().join("missing.png");

        let err = load_frames(&[ImageInput::from(broken), ImageInput::from(missing.clone())]).unwrap_err();
        match err {
            InputError::NotFound(path) => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_memory_frame_rejected_before_decoding() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.png");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&path).unwrap();
        let short = Frame::new(vec![0; 5], 2, 2, 3, 0);
        let gray = Frame::new(vec![0; 4], 2, 2, 1, 0);

        let err = load_frames(&[ImageInput::from(path.as_path()), ImageInput::from(short)]).unwrap_err();
        assert!(matches!(err, InputError::InvalidFrame { position: 1, .. }));
        let err = load_frames(&[ImageInput::from(gray)]).unwrap_err();
        assert!(matches!(err, InputError::InvalidFrame { position: 0, .. }));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(load_frames(&[]), Err(InputError::Empty)));
    }
}
