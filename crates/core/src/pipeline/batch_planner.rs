use std::ops::Range;

use crate::shared::error::InputError;
use crate::shared::frame::Frame;
use crate::video::frame_source::check_frame;

/// A run of consecutive frame positions submitted to providers together.
///
/// Every frame of a batch shares `dimensions` (`(height, width)`); frames of
/// different sizes only ever meet in singleton batches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Position of this batch in the plan; results are re-joined in this order.
    pub index: usize,
    pub positions: Range<usize>,
    pub dimensions: (u32, u32),
}

impl Batch {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn frames<'a>(&self, frames: &'a [Frame]) -> &'a [Frame] {
        &frames[self.positions.clone()]
    }
}

/// Splits frames into consecutive batches of at most `batch_size`.
///
/// With `batch_size > 1` all frames of a batch must share dimensions; the
/// first mismatch fails the whole plan, before any inference. Frames are
/// never resized to make them fit. Malformed frames fail the plan too.
pub fn plan_batches(frames: &[Frame], batch_size: usize) -> Result<Vec<Batch>, InputError> {
    for (position, frame) in frames.iter().enumerate() {
        check_frame(frame, position)?;
    }
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(frames.len().div_ceil(batch_size));

    for (index, start) in (0..frames.len()).step_by(batch_size).enumerate() {
        let end = (start + batch_size).min(frames.len());
        let first = frames[start].dimensions();
        if let Some((offset, other)) = frames[start..end]
            .iter()
            .enumerate()
            .find(|(_, f)| f.dimensions() != first)
        {
            return Err(InputError::MixedDimensions {
                position: start + offset,
                first,
                other: other.dimensions(),
            });
        }
        batches.push(Batch {
            index,
            positions: start..end,
            dimensions: first,
        });
    }

    Ok(batches)
}
