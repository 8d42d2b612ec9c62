use crate::registry::model_selection::{
    is_disabled_token, AuModel, EmotionModel, FaceModel, FaceposeModel, LandmarkModel,
    ProviderFamily,
};
use crate::shared::error::{ConfigurationError, UnknownModel};
use crate::shared::stage::Stage;

/// Raw, unvalidated provider names; `None` disables a stage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelNames {
    pub face: Option<String>,
    pub landmark: Option<String>,
    pub au: Option<String>,
    pub emotion: Option<String>,
    pub facepose: Option<String>,
}

/// A selection the resolver changed, and why.
#[derive(Clone, Debug, PartialEq)]
pub struct Substitution {
    pub stage: Stage,
    pub requested: Option<String>,
    pub resolved: &'static str,
    pub reason: String,
}

/// Validated provider selection: what the detector will actually run.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub face: Option<FaceModel>,
    pub landmark: Option<LandmarkModel>,
    pub au: Option<AuModel>,
    pub emotion: Option<EmotionModel>,
    pub facepose: Option<FaceposeModel>,
    pub substitutions: Vec<Substitution>,
}

impl ResolvedConfig {
    /// Registry key in effect for a stage, `None` if disabled.
    pub fn model_key(&self, stage: Stage) -> Option<&'static str> {
        match stage {
            Stage::Face => self.face.map(|m| m.key()),
            Stage::Landmark => self.landmark.map(|m| m.key()),
            Stage::ActionUnit => self.au.map(|m| m.key()),
            Stage::Emotion => self.emotion.map(|m| m.key()),
            Stage::FacePose => self.facepose.map(|m| m.key()),
        }
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        self.model_key(stage).is_some()
    }

    /// True when face boxes and poses come from the same provider pass.
    pub fn uses_integrated_pose(&self) -> bool {
        self.facepose
            .is_some_and(|p| p.integrated_face_model().is_some())
    }
}

/// Validates provider names and applies cross-stage compatibility rules.
///
/// Every unknown name is reported as its own entry. An integrated pose
/// provider overrides a different face model and the override is recorded
/// in [`ResolvedConfig::substitutions`]. Missing prerequisites that cannot be
/// corrected automatically are rejected.
pub fn resolve(names: &ModelNames) -> Result<ResolvedConfig, ConfigurationError> {
    let mut unknown = Vec::new();

    let face = lookup(Stage::Face, names.face.as_deref(), FaceModel::parse, &mut unknown);
    let landmark = lookup(
        Stage::Landmark,
        names.landmark.as_deref(),
        LandmarkModel::parse,
        &mut unknown,
    );
    let au = lookup(Stage::ActionUnit, names.au.as_deref(), AuModel::parse, &mut unknown);
    let emotion = lookup(
        Stage::Emotion,
        names.emotion.as_deref(),
        EmotionModel::parse,
        &mut unknown,
    );
    let facepose = lookup(
        Stage::FacePose,
        names.facepose.as_deref(),
        FaceposeModel::parse,
        &mut unknown,
    );

    if !unknown.is_empty() {
        return Err(ConfigurationError::UnknownModels(unknown));
    }

    let mut resolved = ResolvedConfig {
        face,
        landmark,
        au,
        emotion,
        facepose,
        substitutions: Vec::new(),
    };

    apply_integrated_pose_override(&mut resolved, names.face.as_deref());
    check_dependencies(&resolved)?;

    Ok(resolved)
}

fn lookup<T>(
    stage: Stage,
    name: Option<&str>,
    parse: fn(&str) -> Option<T>,
    unknown: &mut Vec<UnknownModel>,
) -> Option<T> {
    let name = name.filter(|n| !is_disabled_token(n))?;
    let parsed = parse(name);
    if parsed.is_none() {
        unknown.push(UnknownModel {
            stage,
            name: name.to_string(),
        });
    }
    parsed
}

fn apply_integrated_pose_override(resolved: &mut ResolvedConfig, requested_face: Option<&str>) {
    let Some(pose) = resolved.facepose else {
        return;
    };
    let Some(required_face) = pose.integrated_face_model() else {
        return;
    };
    if resolved.face == Some(required_face) {
        return;
    }

    let reason = format!(
        "face pose model `{}` localizes faces itself and must also be the face model",
        pose.key()
    );
    log::warn!(
        "{reason}; overriding face_model {:?} with `{}`",
        requested_face,
        required_face.key()
    );
    resolved.substitutions.push(Substitution {
        stage: Stage::Face,
        requested: requested_face
            .filter(|n| !is_disabled_token(n))
            .map(str::to_string),
        resolved: required_face.key(),
        reason,
    });
    resolved.face = Some(required_face);
}

fn check_dependencies(resolved: &ResolvedConfig) -> Result<(), ConfigurationError> {
    let missing = |stage: Stage, model: &str, requires: Stage| {
        Err(ConfigurationError::MissingDependency {
            stage,
            model: model.to_string(),
            requires,
        })
    };

    if let Some(landmark) = resolved.landmark {
        if resolved.face.is_none() {
            return missing(Stage::Landmark, landmark.key(), Stage::Face);
        }
    }
    if let Some(au) = resolved.au {
        if resolved.landmark.is_none() {
            return missing(Stage::ActionUnit, au.key(), Stage::Landmark);
        }
    }
    if let Some(emotion) = resolved.emotion {
        if resolved.face.is_none() {
            return missing(Stage::Emotion, emotion.key(), Stage::Face);
        }
        if emotion.family() == ProviderFamily::Features && resolved.landmark.is_none() {
            return missing(Stage::Emotion, emotion.key(), Stage::Landmark);
        }
    }
    if let Some(pose) = resolved.facepose {
        if pose.integrated_face_model().is_none() && resolved.landmark.is_none() {
            return missing(Stage::FacePose, pose.key(), Stage::Landmark);
        }
    }
    Ok(())
}
