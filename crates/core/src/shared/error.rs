use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::shared::model_resolver::ModelResolveError;
use crate::shared::stage::Stage;

pub type FeatResult<T> = Result<T, FeatError>;

/// Top-level error for every public orchestrator operation.
#[derive(Error, Debug)]
pub enum FeatError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("{stage} provider failed: {message}")]
    Provider { stage: Stage, message: String },
    #[error(transparent)]
    ModelResolve(#[from] ModelResolveError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("result schema mismatch: {0}")]
    Schema(String),
    #[error("worker thread failed: {0}")]
    Worker(String),
}

impl FeatError {
    pub fn provider(stage: Stage, message: impl fmt::Display) -> Self {
        FeatError::Provider {
            stage,
            message: message.to_string(),
        }
    }
}

/// A single unrecognized registry key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownModel {
    pub stage: Stage,
    pub name: String,
}

impl fmt::Display for UnknownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.stage.config_key(), self.name)
    }
}

/// Invalid model selection or parameters, detected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown model name(s): {}", join_unknown(.0))]
    UnknownModels(Vec<UnknownModel>),
    #[error("{stage} model `{model}` requires a {requires} model")]
    MissingDependency {
        stage: Stage,
        model: String,
        requires: Stage,
    },
    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },
    #[error("the {0} stage is disabled in this detector")]
    StageDisabled(Stage),
}

impl ConfigurationError {
    /// Unknown names reported by this error, empty for other variants.
    pub fn unknown_models(&self) -> &[UnknownModel] {
        match self {
            ConfigurationError::UnknownModels(list) => list,
            _ => &[],
        }
    }
}

fn join_unknown(list: &[UnknownModel]) -> String {
    list.iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Problems with the input itself, detected before any provider runs.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    #[error(
        "frame {position} is {other:?} (height, width) but its batch started with {first:?}; \
         use batch_size=1 for inputs of different sizes"
    )]
    MixedDimensions {
        position: usize,
        first: (u32, u32),
        other: (u32, u32),
    },
    #[error("frame {position} is malformed: {message}")]
    InvalidFrame { position: usize, message: String },
    #[error("no input frames")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_models_listed_individually() {
        let err = ConfigurationError::UnknownModels(vec![
            UnknownModel {
                stage: Stage::Emotion,
                name: "badmodelname".into(),
            },
            UnknownModel {
                stage: Stage::Face,
                name: "nope".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("emotion_model=\"badmodelname\""));
        assert!(msg.contains("face_model=\"nope\""));
        assert_eq!(err.unknown_models().len(), 2);
    }

    #[test]
    fn test_mixed_dimensions_suggests_unbatched() {
        let err = InputError::MixedDimensions {
            position: 1,
            first: (480, 640),
            other: (100, 100),
        };
        assert!(err.to_string().contains("batch_size=1"));
    }

    #[test]
    fn test_configuration_error_converts_transparently() {
        let err: FeatError = ConfigurationError::InvalidParameter {
            name: "n_jobs",
            message: "must be at least 1".into(),
        }
        .into();
        assert_eq!(err.to_string(), "invalid n_jobs: must be at least 1");
    }
}
