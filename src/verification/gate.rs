//! 人脸可见性判定 (Face-Visibility Gate)

use crate::config::PipelineConfig;
use crate::detection::PoseKeypoints;

/// 按面部关键点置信度判断本帧是否值得做人脸核验
#[derive(Clone, Debug)]
pub struct FaceGate {
    /// 前N个关键点视为面部 (COCO: 鼻子、双眼、双耳)
    keypoint_count: usize,
    /// 关键点置信度需严格大于该值
    min_confidence: f32,
    /// 可见关键点数下限
    min_visible: usize,
}

impl Default for FaceGate {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl FaceGate {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            keypoint_count: config.face_keypoint_count,
            min_confidence: config.face_keypoint_confidence,
            min_visible: config.face_min_visible,
        }
    }

    pub fn is_visible(&self, keypoints: &PoseKeypoints) -> bool {
        let visible = keypoints
            .points
            .iter()
            .take(self.keypoint_count)
            .filter(|(_, _, c)| *c > self.min_confidence)
            .count();
        visible >= self.min_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::keypoints_with;

    #[test]
    fn test_three_confident_points_visible() {
        let gate = FaceGate::default();
        let kpts = keypoints_with(&[0.81, 0.1, 0.81, 0.1, 0.81, 0.9, 0.9]);
        assert!(gate.is_visible(&kpts));
    }

    #[test]
    fn test_two_confident_points_not_visible() {
        let gate = FaceGate::default();
        let kpts = keypoints_with(&[0.81, 0.81, 0.1, 0.1, 0.1]);
        assert!(!gate.is_visible(&kpts));
    }

    #[test]
    fn test_only_first_five_counted() {
        let gate = FaceGate::default();
        // 身体关键点置信度再高也不算
        let kpts = keypoints_with(&[0.9, 0.9, 0.1, 0.1, 0.1, 0.99, 0.99, 0.99]);
        assert!(!gate.is_visible(&kpts));
    }

    #[test]
    fn test_threshold_is_strict() {
        let gate = FaceGate::default();
        let kpts = keypoints_with(&[0.8, 0.8, 0.8, 0.8, 0.8]);
        assert!(!gate.is_visible(&kpts));
    }

    #[test]
    fn test_missing_keypoints() {
        let gate = FaceGate::default();
        assert!(!gate.is_visible(&PoseKeypoints::default()));
    }
}
