//! Facial expression analysis: face boxes, 68-point landmarks, action units,
//! emotions and head pose for images, videos and in-memory frames.
//!
//! [`pipeline::detector::Detector`] is the entry point; results come back as
//! a [`results::result_table::ResultTable`].

pub mod detection;
pub mod features;
pub mod pipeline;
pub mod registry;
pub mod results;
pub mod shared;
pub mod video;
