pub mod face_aligner;
pub mod face_crop;
pub mod hog_features;
