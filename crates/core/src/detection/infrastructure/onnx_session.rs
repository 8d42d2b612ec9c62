//! Shared ONNX Runtime plumbing for the provider adapters: session setup,
//! NCHW tensor packing and output post-processing.

use std::path::Path;

use image::RgbImage;
use ndarray::{s, Array4, ArrayViewMut3};

use crate::shared::frame::Frame;

/// Per-channel normalization applied to `u8` pixels: `(v / 255 - mean) / std`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    /// Plain `[0, 1]` scaling.
    pub const UNIT: Normalization = Normalization {
        mean: [0.0; 3],
        std: [1.0; 3],
    };

    pub const IMAGENET: Normalization = Normalization {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    fn apply(&self, value: u8, channel: usize) -> f32 {
        (value as f32 / 255.0 - self.mean[channel]) / self.std[channel]
    }
}

pub fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(platform_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

type ExecutionProviders = Vec<ort::execution_providers::ExecutionProviderDispatch>;

/// The platform's default accelerator. ONNX Runtime falls back to CPU when
/// it is unavailable.
#[cfg(target_os = "macos")]
fn platform_execution_providers() -> ExecutionProviders {
    vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
}

#[cfg(target_os = "windows")]
fn platform_execution_providers() -> ExecutionProviders {
    vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_execution_providers() -> ExecutionProviders {
    Vec::new()
}

/// Square input side declared by the model (NCHW), if static.
pub fn declared_input_size(session: &ort::session::Session) -> Option<u32> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            if shape.len() >= 4 && shape[2] > 0 {
                return Some(shape[2] as u32);
            }
        }
        None
    })
}

/// Letterbox geometry: `model = frame * scale + pad`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Letterboxes each frame into one `[B, 3, size, size]` tensor.
pub fn letterbox_batch(frames: &[Frame], size: u32, norm: Normalization) -> (Array4<f32>, Vec<Letterbox>) {
    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((frames.len(), 3, side, side));
    let boxes: Vec<Letterbox> = frames
        .iter()
        .enumerate()
        .map(|(b, frame)| letterbox_into(frame, size, norm, tensor.slice_mut(s![b, .., .., ..])))
        .collect();
    (tensor, boxes)
}

fn letterbox_into(frame: &Frame, size: u32, norm: Normalization, mut out: ArrayViewMut3<f32>) -> Letterbox {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let target = size as f32;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(size);
    let new_h = ((fh * scale).round() as u32).min(size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f32 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f32 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                out[[c, ty, tx]] = norm.apply(src[[src_y, src_x, c]], c);
            }
        }
    }

    Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    }
}

/// Packs equally sized crops into `[N, 3, H, W]`.
pub fn crops_to_nchw<'a>(crops: impl ExactSizeIterator<Item = &'a RgbImage>, norm: Normalization) -> Array4<f32> {
    let n = crops.len();
    let mut tensor: Option<Array4<f32>> = None;
    for (i, crop) in crops.enumerate() {
        let (w, h) = crop.dimensions();
        let t = tensor.get_or_insert_with(|| Array4::<f32>::zeros((n, 3, h as usize, w as usize)));
        for (x, y, px) in crop.enumerate_pixels() {
            for c in 0..3 {
                t[[i, c, y as usize, x as usize]] = norm.apply(px[c], c);
            }
        }
    }
    tensor.unwrap_or_else(|| Array4::<f32>::zeros((0, 3, 0, 0)))
}

/// Fails unless a session run produced at least one output tensor.
pub fn require_output(count: usize, model: &str) -> Result<(), Box<dyn std::error::Error>> {
    if count == 0 {
        return Err(format!("{model} model produced no outputs").into());
    }
    Ok(())
}

pub fn softmax_in_place(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
