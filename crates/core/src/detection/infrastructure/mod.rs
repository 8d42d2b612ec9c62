pub mod onnx_classifier;
pub mod onnx_face_detector;
pub mod onnx_landmark_detector;
pub mod onnx_provider_factory;
mod onnx_session;
pub mod pnp_pose_estimator;
