// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 外部模型统一接口与参考实现
///
/// # 架构说明
///
/// 流水线不关心模型内部, 只依赖三个能力接口:
/// - **PersonDetector**: 人体检测 + 姿态关键点
/// - **FaceVerifier**: 单张人脸裁剪图是否匹配已登记人员
/// - **ViolenceClassifier**: 有序帧窗口 → 各类别概率
///
/// 模型一般体积较大, 可在多个会话之间通过 `Shared` 共享;
/// 跟踪器和所有跨帧状态则必须每个会话独立持有。
///
/// ## 参考实现
/// - `replay.rs`: 从 JSON Lines 回放检测结果
/// - `gallery.rs`: 基于平均哈希指纹的人脸库比对
/// - `motion.rs`: 基于帧间运动能量的暴力分类
use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::RgbImage;
use ndarray::Array1;

use crate::detection::Detection;
use crate::violence::ClipFrame;

pub mod gallery;
pub mod motion;
pub mod replay;

pub use gallery::GalleryVerifier;
pub use motion::MotionEnergyClassifier;
pub use replay::ReplayDetector;

/// 跨会话共享的模型句柄
pub type Shared<T> = Arc<Mutex<T>>;

/// 人体检测器
pub trait PersonDetector {
    /// 检测一帧中的所有人, 可以返回空列表
    ///
    /// # Returns
    /// * 每个人的框(含置信度)与关键点, 下标对齐
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;
}

/// 人脸核验模型
pub trait FaceVerifier {
    /// 裁剪出的人脸区域是否与已登记人员匹配
    ///
    /// 返回 `Err` 时调用方按"未匹配"处理。
    fn verify(&mut self, face: &RgbImage) -> Result<bool>;
}

/// 暴力行为分类模型
pub trait ViolenceClassifier {
    /// 对按时间排序的片段帧窗口分类
    ///
    /// # Returns
    /// * 定长概率向量, 下标即类别
    fn classify(&mut self, window: &[&ClipFrame]) -> Result<Array1<f32>>;
}
