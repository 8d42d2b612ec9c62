//! Closed set of provider names per analysis stage.
//!
//! Every selectable provider is a variant here; a name token either parses
//! to a variant or is rejected at construction. Output shapes that the
//! result schema depends on are declared by the variant, never inferred from
//! provider output.

use crate::shared::constants::{CLASSICAL_AU_NAMES, EMOTION_NAMES, NETWORK_AU_NAMES};

/// Tokens that explicitly disable a stage.
const DISABLED_TOKENS: [&str; 2] = ["none", ""];

/// Whether a classifier consumes HOG features or the face crop directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderFamily {
    /// HOG descriptor of a landmark-aligned crop plus aligned landmarks.
    Features,
    /// Image crop fed straight to a network.
    Network,
}

/// Returns true when a token selects "no provider" for its stage.
pub fn is_disabled_token(name: &str) -> bool {
    let lower = name.trim().to_ascii_lowercase();
    DISABLED_TOKENS.contains(&lower.as_str())
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceModel {
    RetinaFace,
    FaceBoxes,
    Mtcnn,
    Img2Pose,
    Img2PoseConstrained,
}

impl FaceModel {
    pub const ALL: [FaceModel; 5] = [
        FaceModel::RetinaFace,
        FaceModel::FaceBoxes,
        FaceModel::Mtcnn,
        FaceModel::Img2Pose,
        FaceModel::Img2PoseConstrained,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FaceModel::RetinaFace => "retinaface",
            FaceModel::FaceBoxes => "faceboxes",
            FaceModel::Mtcnn => "mtcnn",
            FaceModel::Img2Pose => "img2pose",
            FaceModel::Img2PoseConstrained => "img2pose-c",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = normalize(name);
        Self::ALL.into_iter().find(|m| m.key() == name)
    }

    pub fn model_file(&self) -> &'static str {
        match self {
            FaceModel::RetinaFace => "retinaface_mobilenet0.25.onnx",
            FaceModel::FaceBoxes => "faceboxes.onnx",
            FaceModel::Mtcnn => "mtcnn.onnx",
            FaceModel::Img2Pose => "img2pose.onnx",
            FaceModel::Img2PoseConstrained => "img2pose_constrained.onnx",
        }
    }

    /// Providers that localize faces and estimate pose in one pass.
    pub fn is_integrated_pose(&self) -> bool {
        matches!(self, FaceModel::Img2Pose | FaceModel::Img2PoseConstrained)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LandmarkModel {
    MobileNet,
    MobileFaceNet,
    Pfld,
}

impl LandmarkModel {
    pub const ALL: [LandmarkModel; 3] = [
        LandmarkModel::MobileNet,
        LandmarkModel::MobileFaceNet,
        LandmarkModel::Pfld,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            LandmarkModel::MobileNet => "mobilenet",
            LandmarkModel::MobileFaceNet => "mobilefacenet",
            LandmarkModel::Pfld => "pfld",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = normalize(name);
        Self::ALL.into_iter().find(|m| m.key() == name)
    }

    pub fn model_file(&self) -> &'static str {
        match self {
            LandmarkModel::MobileNet => "mobilenet_224_landmarks.onnx",
            LandmarkModel::MobileFaceNet => "mobilefacenet_landmarks.onnx",
            LandmarkModel::Pfld => "pfld_landmarks.onnx",
        }
    }

    /// Square crop side the landmark network expects.
    pub fn input_size(&self) -> u32 {
        match self {
            LandmarkModel::MobileNet => 224,
            LandmarkModel::MobileFaceNet | LandmarkModel::Pfld => 112,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuModel {
    JaaNet,
    Drml,
    Logistic,
    Svm,
    RandomForest,
}

impl AuModel {
    pub const ALL: [AuModel; 5] = [
        AuModel::JaaNet,
        AuModel::Drml,
        AuModel::Logistic,
        AuModel::Svm,
        AuModel::RandomForest,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AuModel::JaaNet => "jaanet",
            AuModel::Drml => "drml",
            AuModel::Logistic => "logistic",
            AuModel::Svm => "svm",
            AuModel::RandomForest => "rf",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = normalize(name);
        Self::ALL.into_iter().find(|m| m.key() == name)
    }

    pub fn model_file(&self) -> &'static str {
        match self {
            AuModel::JaaNet => "jaanet_au.onnx",
            AuModel::Drml => "drml_au.onnx",
            AuModel::Logistic => "logistic_au.onnx",
            AuModel::Svm => "svm_au.onnx",
            AuModel::RandomForest => "rf_au.onnx",
        }
    }

    pub fn family(&self) -> ProviderFamily {
        match self {
            AuModel::JaaNet | AuModel::Drml => ProviderFamily::Network,
            AuModel::Logistic | AuModel::Svm | AuModel::RandomForest => ProviderFamily::Features,
        }
    }

    /// Column labels, one per output dimension.
    pub fn column_names(&self) -> &'static [&'static str] {
        match self.family() {
            ProviderFamily::Network => &NETWORK_AU_NAMES,
            ProviderFamily::Features => &CLASSICAL_AU_NAMES,
        }
    }

    pub fn input_size(&self) -> u32 {
        match self {
            AuModel::JaaNet => 200,
            AuModel::Drml => 170,
            _ => crate::shared::constants::ALIGNED_FACE_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmotionModel {
    ResMaskNet,
    Fer,
    Svm,
    RandomForest,
}

impl EmotionModel {
    pub const ALL: [EmotionModel; 4] = [
        EmotionModel::ResMaskNet,
        EmotionModel::Fer,
        EmotionModel::Svm,
        EmotionModel::RandomForest,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            EmotionModel::ResMaskNet => "resmasknet",
            EmotionModel::Fer => "fer",
            EmotionModel::Svm => "svm",
            EmotionModel::RandomForest => "rf",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = normalize(name);
        Self::ALL.into_iter().find(|m| m.key() == name)
    }

    pub fn model_file(&self) -> &'static str {
        match self {
            EmotionModel::ResMaskNet => "resmasknet_emotion.onnx",
            EmotionModel::Fer => "fer_emotion.onnx",
            EmotionModel::Svm => "svm_emotion.onnx",
            EmotionModel::RandomForest => "rf_emotion.onnx",
        }
    }

    pub fn family(&self) -> ProviderFamily {
        match self {
            EmotionModel::ResMaskNet | EmotionModel::Fer => ProviderFamily::Network,
            EmotionModel::Svm | EmotionModel::RandomForest => ProviderFamily::Features,
        }
    }

    pub fn column_names(&self) -> &'static [&'static str] {
        &EMOTION_NAMES
    }

    pub fn input_size(&self) -> u32 {
        match self {
            EmotionModel::ResMaskNet => 224,
            EmotionModel::Fer => 48,
            _ => crate::shared::constants::ALIGNED_FACE_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceposeModel {
    Pnp,
    Img2Pose,
    Img2PoseConstrained,
}

impl FaceposeModel {
    pub const ALL: [FaceposeModel; 3] = [
        FaceposeModel::Pnp,
        FaceposeModel::Img2Pose,
        FaceposeModel::Img2PoseConstrained,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FaceposeModel::Pnp => "pnp",
            FaceposeModel::Img2Pose => "img2pose",
            FaceposeModel::Img2PoseConstrained => "img2pose-c",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = normalize(name);
        Self::ALL.into_iter().find(|m| m.key() == name)
    }

    /// The face model this pose provider doubles as, if it localizes faces itself.
    pub fn integrated_face_model(&self) -> Option<FaceModel> {
        match self {
            FaceposeModel::Pnp => None,
            FaceposeModel::Img2Pose => Some(FaceModel::Img2Pose),
            FaceposeModel::Img2PoseConstrained => Some(FaceModel::Img2PoseConstrained),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("RetinaFace", Some(FaceModel::RetinaFace))]
    #[case("  faceboxes ", Some(FaceModel::FaceBoxes))]
    #[case("MTCNN", Some(FaceModel::Mtcnn))]
    #[case("img2pose-c", Some(FaceModel::Img2PoseConstrained))]
    #[case("yolo", None)]
    fn test_face_model_parse(#[case] name: &str, #[case] expected: Option<FaceModel>) {
        assert_eq!(FaceModel::parse(name), expected);
    }

    #[test]
    fn test_keys_round_trip_for_every_variant() {
        for m in FaceModel::ALL {
            assert_eq!(FaceModel::parse(m.key()), Some(m));
        }
        for m in LandmarkModel::ALL {
            assert_eq!(LandmarkModel::parse(m.key()), Some(m));
        }
        for m in AuModel::ALL {
            assert_eq!(AuModel::parse(m.key()), Some(m));
        }
        for m in EmotionModel::ALL {
            assert_eq!(EmotionModel::parse(m.key()), Some(m));
        }
        for m in FaceposeModel::ALL {
            assert_eq!(FaceposeModel::parse(m.key()), Some(m));
        }
    }

    #[rstest]
    #[case(AuModel::JaaNet, 12)]
    #[case(AuModel::Drml, 12)]
    #[case(AuModel::Logistic, 20)]
    #[case(AuModel::Svm, 20)]
    #[case(AuModel::RandomForest, 20)]
    fn test_au_dimensions(#[case] model: AuModel, #[case] dims: usize) {
        assert_eq!(model.column_names().len(), dims);
    }

    #[test]
    fn test_families() {
        assert_eq!(AuModel::Drml.family(), ProviderFamily::Network);
        assert_eq!(AuModel::Svm.family(), ProviderFamily::Features);
        assert_eq!(EmotionModel::Fer.family(), ProviderFamily::Network);
        assert_eq!(EmotionModel::RandomForest.family(), ProviderFamily::Features);
    }

    #[test]
    fn test_disabled_tokens() {
        assert!(is_disabled_token("None"));
        assert!(is_disabled_token(""));
        assert!(!is_disabled_token("rf"));
    }

    #[test]
    fn test_integrated_pose_mapping() {
        assert_eq!(FaceposeModel::Pnp.integrated_face_model(), None);
        assert_eq!(
            FaceposeModel::Img2PoseConstrained.integrated_face_model(),
            Some(FaceModel::Img2PoseConstrained)
        );
        assert!(FaceModel::Img2Pose.is_integrated_pose());
        assert!(!FaceModel::RetinaFace.is_integrated_pose());
    }
}
