use std::fmt;

/// The five analysis roles a provider can fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Face,
    Landmark,
    ActionUnit,
    Emotion,
    FacePose,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Face,
        Stage::Landmark,
        Stage::ActionUnit,
        Stage::Emotion,
        Stage::FacePose,
    ];

    /// Name of the configuration field selecting this stage's provider.
    pub fn config_key(&self) -> &'static str {
        match self {
            Stage::Face => "face_model",
            Stage::Landmark => "landmark_model",
            Stage::ActionUnit => "au_model",
            Stage::Emotion => "emotion_model",
            Stage::FacePose => "facepose_model",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Face => "face",
            Stage::Landmark => "landmark",
            Stage::ActionUnit => "action unit",
            Stage::Emotion => "emotion",
            Stage::FacePose => "face pose",
        };
        f.write_str(name)
    }
}
