/// 检测/跟踪系统数据结构定义
/// Data structures for the detection and tracking stages

/// 跟踪ID (由跟踪器分配, 核心流程只把它当作稳定的键)
pub type TrackId = u32;

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// 面积 (退化框返回0)
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn xyxy(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// 姿态关键点 (Pose keypoints), COCO顺序: 0-鼻子 1-左眼 2-右眼 3-左耳 4-右耳 ...
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseKeypoints {
    pub points: Vec<(f32, f32, f32)>, // (x, y, confidence)
}

impl PoseKeypoints {
    pub fn new(points: Vec<(f32, f32, f32)>) -> Self {
        Self { points }
    }
}

/// 单帧人体检测结果: 框 + 关键点 (下标对齐)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub keypoints: PoseKeypoints,
}

/// 跟踪器当前轨迹快照
#[derive(Clone, Debug, PartialEq)]
pub struct TrackSnapshot {
    pub id: TrackId,
    /// 是否已确认 (连续命中足够帧数)
    pub confirmed: bool,
    /// 距离上次被检测更新经过的帧数
    pub frames_since_update: u32,
    /// 跟踪器自己估计的当前位置
    pub bbox: BBox,
}

/// 单帧身份记录 (每帧由关联器重建)
///
/// 只有 `votes` 和 `verified` 会从上一帧同ID的记录继承,
/// `None` 表示该字段从未产生过, 与 "投过票" / "核验失败" 区分开。
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityRecord {
    pub track_id: TrackId,
    /// 跟踪器给出的位置
    pub bbox: BBox,
    /// 匹配到的检测框的关键点
    pub keypoints: PoseKeypoints,
    /// 核验投票历史 (首次有效投票时创建)
    pub votes: Option<Vec<bool>>,
    /// 最终核验结论 (一经写入不再改变)
    pub verified: Option<bool>,
}

impl IdentityRecord {
    pub fn new(track_id: TrackId, bbox: BBox, keypoints: PoseKeypoints) -> Self {
        Self {
            track_id,
            bbox,
            keypoints,
            votes: None,
            verified: None,
        }
    }

    /// 已计入的票数
    pub fn vote_count(&self) -> usize {
        self.votes.as_ref().map_or(0, Vec::len)
    }
}
