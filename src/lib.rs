// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
#![allow(clippy::type_complexity)]
pub mod config; // 流水线配置参数
pub mod detection; // 检测结果、跟踪器与关联
pub mod models; // 外部模型接口与参考实现
pub mod pipeline; // 逐帧编排器
pub mod verification; // 人脸可见性判定 + 身份核验共识
pub mod violence; // 暴力事件状态机

#[cfg(test)]
pub(crate) mod testing;

pub use crate::config::{Args, PipelineConfig};
pub use crate::detection::{iou, BBox, Detection, IdentityRecord, PoseKeypoints, TrackId};
pub use crate::models::{FaceVerifier, PersonDetector, Shared, ViolenceClassifier};
pub use crate::pipeline::{FrameOutput, FrameProcessor, SharedModels};
pub use crate::violence::{ViolenceSignal, ViolenceState};

/// 流水线错误 (单帧级别)
///
/// 除解码失败与检测器失败外,其余异常(人脸核验失败、暴力分类失败、裁剪为空)
/// 都在各自阶段内部降级处理,不会传播到调用方。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to decode frame: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode annotated frame: {0}")]
    Encode(#[source] image::ImageError),

    #[error("person detector failed: {0:#}")]
    Detector(anyhow::Error),
}

/// 生成时间戳字符串 (用于告警日志与输出文件名)
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%3f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
