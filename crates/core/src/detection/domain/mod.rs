pub mod face_classifier;
pub mod face_detector;
pub mod face_landmarks;
pub mod head_pose;
pub mod landmark_detector;
