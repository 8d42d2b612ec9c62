pub mod constants;
pub mod error;
pub mod face;
pub mod frame;
pub mod model_resolver;
pub mod stage;
pub mod video_metadata;
