pub const DEFAULT_FACE_MODEL: &str = "retinaface";
pub const DEFAULT_LANDMARK_MODEL: &str = "mobilenet";
pub const DEFAULT_AU_MODEL: &str = "rf";
pub const DEFAULT_EMOTION_MODEL: &str = "resmasknet";
pub const DEFAULT_FACEPOSE_MODEL: &str = "pnp";

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_N_JOBS: usize = 1;
pub const DEFAULT_SKIP_FRAMES: usize = 1;

/// Points per landmark set (iBUG-68 layout).
pub const NUM_LANDMARKS: usize = 68;

/// Side of the landmark-aligned face crop fed to AU and HOG extraction.
pub const ALIGNED_FACE_SIZE: u32 = 112;

/// Release location for ONNX model files; each provider appends its file name.
pub const MODEL_RELEASE_URL: &str = "https://github.com/facefeat/facefeat-models/releases/download/v0.1.0";

pub const METADATA_COLUMNS: [&str; 2] = ["input", "frame"];
pub const FACE_BOX_COLUMNS: [&str; 4] = ["FaceRectX", "FaceRectY", "FaceRectWidth", "FaceRectHeight"];
pub const FACE_SCORE_COLUMN: &str = "FaceScore";
pub const POSE_COLUMNS: [&str; 3] = ["Pitch", "Roll", "Yaw"];

/// Output order of the network AU providers.
pub const NETWORK_AU_NAMES: [&str; 12] = [
    "AU01", "AU02", "AU04", "AU06", "AU07", "AU10", "AU12", "AU14", "AU15", "AU17", "AU23", "AU24",
];

/// Output order of the HOG-feature AU classifiers.
pub const CLASSICAL_AU_NAMES: [&str; 20] = [
    "AU01", "AU02", "AU04", "AU05", "AU06", "AU07", "AU09", "AU10", "AU11", "AU12", "AU14", "AU15",
    "AU17", "AU20", "AU23", "AU24", "AU25", "AU26", "AU28", "AU43",
];

pub const EMOTION_NAMES: [&str; 7] = [
    "anger",
    "disgust",
    "fear",
    "happiness",
    "sadness",
    "surprise",
    "neutral",
];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
