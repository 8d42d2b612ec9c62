use std::path::Path;

use crate::shared::error::InputError;
use crate::shared::frame::Frame;

/// Decodes an image file into an RGB frame tagged with its path.
///
/// Alpha is dropped and grayscale is expanded, so every frame has three
/// channels regardless of the file's color type.
pub fn load_image(path: &Path, index: usize) -> Result<Frame, InputError> {
    if !path.is_file() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    let decoded = image::open(path).map_err(|e| InputError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::debug!(
        "Decoded {} ({}x{})",
        path.display(),
        decoded.width(),
        decoded.height()
    );
    Ok(Frame::from_rgb_image(decoded.to_rgb8(), index).with_source(path.to_string_lossy()))
}
