//! 多目标跟踪公共组件
//! Common components for multi-object tracking

use image::RgbImage;

use super::types::{BBox, TrackSnapshot};

// ========== 跟踪器统一接口 ==========

/// 多目标跟踪器 Trait
///
/// 流水线只依赖这两个能力: 每帧喂入检测框, 再读取当前轨迹。
/// 匹配代价、轨迹生命周期等细节由具体实现决定。
pub trait Tracker {
    /// 用当前帧的检测框(含置信度)更新跟踪器
    ///
    /// # 参数
    /// - `detections`: 当前帧的人体框, 置信度取自 `BBox::confidence`
    /// - `frame`: 当前帧图像 (外观特征类跟踪器可用)
    fn update(&mut self, detections: &[BBox], frame: &RgbImage);

    /// 当前所有轨迹 (包括未确认、暂时丢失的)
    fn current_tracks(&self) -> Vec<TrackSnapshot>;

    /// 重置跟踪器 (清除所有跟踪)
    fn reset(&mut self);
}

// ========== 卡尔曼滤波器 ==========

/// 简化卡尔曼滤波器 (匀速模型, 对角协方差)
/// 状态向量: [cx, cy, w, h, vx, vy, vw, vh]
#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    state: [f32; 8],
    p: [f32; 8],
    /// 过程噪声
    q: f32,
    /// 观测噪声
    r: f32,
    /// 速度衰减因子
    velocity_decay: f32,
}

impl KalmanBoxFilter {
    /// # 参数
    /// - `q`: 过程噪声 (0.1-1.0, 越小越平滑)
    /// - `r`: 观测噪声 (0.5-50.0, 越大越平滑)
    pub fn new(bbox: &BBox, q: f32, r: f32) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            state: [cx, cy, bbox.width(), bbox.height(), 0.0, 0.0, 0.0, 0.0],
            p: [10.0; 8],
            q,
            r,
            velocity_decay: 0.95,
        }
    }

    /// 预测下一帧状态
    pub fn predict(&mut self) {
        for i in 4..8 {
            self.state[i] *= self.velocity_decay;
        }
        for i in 0..4 {
            self.state[i] += self.state[i + 4];
        }
        for p in self.p.iter_mut() {
            *p += self.q;
        }
    }

    /// 融合观测值
    pub fn update(&mut self, bbox: &BBox) {
        let (cx, cy) = bbox.center();
        let z = [cx, cy, bbox.width(), bbox.height()];

        for i in 0..4 {
            let residual = z[i] - self.state[i];
            let k = self.p[i] / (self.p[i] + self.r);
            let kv = self.p[i + 4] / (self.p[i + 4] + self.r * 10.0);
            self.state[i] += k * residual;
            self.state[i + 4] += kv * residual;
            self.p[i] *= 1.0 - k;
            self.p[i + 4] *= 1.0 - kv;
        }
    }

    /// 当前状态对应的边界框
    pub fn bbox(&self) -> BBox {
        Self::to_bbox(&self.state[..4])
    }

    /// 下一帧预测框 (用于匹配)
    pub fn predicted_bbox(&self) -> BBox {
        let next: Vec<f32> = (0..4).map(|i| self.state[i] + self.state[i + 4]).collect();
        Self::to_bbox(&next)
    }

    fn to_bbox(s: &[f32]) -> BBox {
        let w = s[2].max(1.0);
        let h = s[3].max(1.0);
        BBox::new(s[0] - w / 2.0, s[1] - h / 2.0, s[0] + w / 2.0, s[1] + h / 2.0, 1.0)
    }
}

// ========== 工具函数 ==========

/// 计算两个边界框的IOU (Intersection over Union)
///
/// 并集面积为0(两个退化框)时返回0, 结果始终落在 [0, 1]。
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    iou_xyxy(a.xyxy(), b.xyxy())
}

/// `[x1, y1, x2, y2]` 形式的IOU
pub fn iou_xyxy(a: [f32; 4], b: [f32; 4]) -> f32 {
    let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = iw * ih;

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union <= 0.0 {
        return 0.0;
    }

    (intersection / union).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBox {
        BBox::new(x1, y1, x2, y2, 1.0)
    }

    #[test]
    fn test_iou_identical() {
        let a = bbox(10.0, 20.0, 110.0, 220.0);
        assert_eq!(iou(&a, &a), 1.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = bbox(0.0, 0.0, 50.0, 50.0);
        let b = bbox(25.0, 10.0, 90.0, 70.0);
        assert_eq!(iou(&a, &b), iou(&b, &a));
        assert!(iou(&a, &b) > 0.0 && iou(&a, &b) < 1.0);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 30.0, 30.0);
        assert_eq!(iou(&a, &b), 0.0);

        // 仅边相接
        let c = bbox(10.0, 0.0, 20.0, 10.0);
        assert_eq!(iou(&a, &c), 0.0);
    }

    #[test]
    fn test_iou_degenerate() {
        let empty = bbox(5.0, 5.0, 5.0, 5.0);
        assert_eq!(iou(&empty, &empty), 0.0);
        assert_eq!(iou(&empty, &bbox(0.0, 0.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 15.0, 10.0);
        // 交集50, 并集150
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_kalman_converges_to_observation() {
        let start = bbox(0.0, 0.0, 20.0, 40.0);
        let mut kf = KalmanBoxFilter::new(&start, 0.1, 0.5);
        let target = bbox(4.0, 0.0, 24.0, 40.0);
        for _ in 0..20 {
            kf.predict();
            kf.update(&target);
        }
        assert!(iou(&kf.bbox(), &target) > 0.9);
    }
}
