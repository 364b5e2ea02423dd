// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统 (Detection System)
///
/// - types:      检测框、关键点、轨迹快照、身份记录
/// - tracker:    跟踪器接口 + IOU + 卡尔曼滤波
/// - bytetrack:  参考跟踪器实现
/// - associator: 轨迹与检测结果关联
pub mod associator;
pub mod bytetrack;
pub mod tracker;
pub mod types;

pub use associator::associate;
pub use bytetrack::ByteTracker;
pub use tracker::{iou, iou_xyxy, KalmanBoxFilter, Tracker};
pub use types::{BBox, Detection, IdentityRecord, PoseKeypoints, TrackId, TrackSnapshot};
