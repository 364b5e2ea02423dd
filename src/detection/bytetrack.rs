//! ByteTrack 算法实现
//! ByteTrack: Simple and effective multi-object tracking
//!
//! 核心思想:
//! 1. 高低分检测框分开处理
//! 2. 高分框优先匹配 (IOU)
//! 3. 低分框救援丢失的轨迹
//! 4. 连续命中 `n_init` 帧后轨迹才被确认, 丢失超过 `max_age` 帧删除

use image::RgbImage;
use log::debug;

use super::tracker::{iou, KalmanBoxFilter, Tracker};
use super::types::{BBox, TrackId, TrackSnapshot};
use crate::config::PipelineConfig;

/// ByteTrack 跟踪对象
#[derive(Clone, Debug)]
struct ByteTrack {
    id: TrackId,
    kalman: KalmanBoxFilter,
    /// 连续命中帧数
    hits: u32,
    /// 距离上次更新的帧数
    frames_since_update: u32,
    confirmed: bool,
}

impl ByteTrack {
    fn new(id: TrackId, bbox: &BBox) -> Self {
        Self {
            id,
            // 低观测噪声, 更信任检测结果
            kalman: KalmanBoxFilter::new(bbox, 0.1, 0.5),
            hits: 1,
            frames_since_update: 0,
            confirmed: false,
        }
    }

    fn update(&mut self, bbox: &BBox, n_init: u32) {
        self.kalman.update(bbox);
        self.hits += 1;
        self.frames_since_update = 0;
        if self.hits >= n_init {
            self.confirmed = true;
        }
    }

    fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            confirmed: self.confirmed,
            frames_since_update: self.frames_since_update,
            bbox: self.kalman.bbox(),
        }
    }
}

/// ByteTrack 追踪器
pub struct ByteTracker {
    tracks: Vec<ByteTrack>,
    next_id: TrackId,

    /// 最大允许丢失帧数
    max_age: u32,
    /// 确认所需命中帧数
    n_init: u32,
    /// 高分检测阈值
    high_score_threshold: f32,
    /// 低分检测阈值 (用于救援)
    low_score_threshold: f32,
    /// 高分匹配 IOU 阈值
    high_iou_threshold: f32,
    /// 低分匹配 IOU 阈值
    low_iou_threshold: f32,
}

impl ByteTracker {
    pub fn new() -> Self {
        Self::from_config(&PipelineConfig::default())
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_age: config.tracker_max_age,
            n_init: config.tracker_n_init.max(1),
            high_score_threshold: config.tracker_high_score_threshold,
            low_score_threshold: config.tracker_low_score_threshold,
            high_iou_threshold: config.tracker_high_iou_threshold,
            low_iou_threshold: config.tracker_low_iou_threshold,
        }
    }

    /// IOU 贪心匹配, 返回 (检测下标, 轨迹下标)
    fn match_detections(
        &self,
        detections: &[(usize, &BBox)],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        let mut candidates = Vec::new();
        for (local_det, (det_idx, det)) in detections.iter().enumerate() {
            for (local_track, &track_idx) in track_indices.iter().enumerate() {
                let overlap = iou(det, &self.tracks[track_idx].kalman.predicted_bbox());
                if overlap >= iou_threshold {
                    candidates.push((overlap, *det_idx, local_det, track_idx, local_track));
                }
            }
        }

        // 按IOU从大到小
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut assignments = Vec::new();
        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; track_indices.len()];
        for (_, det_idx, local_det, track_idx, local_track) in candidates {
            if !used_det[local_det] && !used_track[local_track] {
                assignments.push((det_idx, track_idx));
                used_det[local_det] = true;
                used_track[local_track] = true;
            }
        }
        assignments
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker for ByteTracker {
    /// 更新跟踪 (ByteTrack 两轮匹配)
    fn update(&mut self, detections: &[BBox], _frame: &RgbImage) {
        // 1. 所有轨迹先预测
        for track in &mut self.tracks {
            track.kalman.predict();
        }

        // 2. 分离高低分检测框
        let high: Vec<(usize, &BBox)> = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.confidence >= self.high_score_threshold)
            .collect();
        let low: Vec<(usize, &BBox)> = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                d.confidence < self.high_score_threshold && d.confidence >= self.low_score_threshold
            })
            .collect();

        let mut matched_det = vec![false; detections.len()];
        let mut matched_track = vec![false; self.tracks.len()];

        // 3. 第一轮: 高分检测 + 所有轨迹
        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        for (det_idx, track_idx) in self.match_detections(&high, &all_tracks, self.high_iou_threshold)
        {
            matched_det[det_idx] = true;
            matched_track[track_idx] = true;
            self.tracks[track_idx].update(&detections[det_idx], self.n_init);
        }

        // 4. 第二轮: 低分检测 + 未匹配轨迹 (救援)
        let unmatched: Vec<usize> = (0..self.tracks.len())
            .filter(|&idx| !matched_track[idx])
            .collect();
        for (det_idx, track_idx) in self.match_detections(&low, &unmatched, self.low_iou_threshold) {
            matched_det[det_idx] = true;
            matched_track[track_idx] = true;
            self.tracks[track_idx].update(&detections[det_idx], self.n_init);
        }

        // 5. 未匹配轨迹 → 标记丢失; 未确认轨迹一旦丢失立即删除
        for (track_idx, &matched) in matched_track.iter().enumerate() {
            if !matched {
                let track = &mut self.tracks[track_idx];
                track.frames_since_update += 1;
                track.hits = 0;
            }
        }
        let max_age = self.max_age;
        self.tracks.retain(|t| {
            if t.frames_since_update == 0 {
                true
            } else {
                t.confirmed && t.frames_since_update <= max_age
            }
        });

        // 6. 未匹配的高分检测 → 新建轨迹
        for (det_idx, det) in detections.iter().enumerate() {
            if !matched_det[det_idx] && det.confidence >= self.high_score_threshold {
                let mut track = ByteTrack::new(self.next_id, det);
                track.confirmed = self.n_init <= 1;
                debug!("🆕 新轨迹 #{}", track.id);
                self.tracks.push(track);
                self.next_id += 1;
            }
        }
    }

    fn current_tracks(&self) -> Vec<TrackSnapshot> {
        self.tracks.iter().map(ByteTrack::snapshot).collect()
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> RgbImage {
        RgbImage::new(4, 4)
    }

    fn person(x: f32) -> BBox {
        BBox::new(x, 10.0, x + 40.0, 110.0, 0.9)
    }

    #[test]
    fn test_track_confirmed_after_n_init() {
        let mut tracker = ByteTracker::new(); // n_init = 4
        for i in 0..3 {
            tracker.update(&[person(10.0 + i as f32)], &frame());
            let tracks = tracker.current_tracks();
            assert_eq!(tracks.len(), 1);
            assert!(!tracks[0].confirmed);
        }
        tracker.update(&[person(13.0)], &frame());
        let tracks = tracker.current_tracks();
        assert!(tracks[0].confirmed);
        assert_eq!(tracks[0].frames_since_update, 0);
        assert_eq!(tracks[0].id, 1);
    }

    #[test]
    fn test_two_people_keep_ids() {
        let mut tracker = ByteTracker::new();
        for i in 0..6 {
            let dx = i as f32;
            tracker.update(&[person(10.0 + dx), person(200.0 - dx)], &frame());
        }
        let mut ids: Vec<_> = tracker.current_tracks().iter().map(|t| t.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_lost_track_ages_and_expires() {
        let config = PipelineConfig {
            tracker_n_init: 1,
            tracker_max_age: 2,
            ..Default::default()
        };
        let mut tracker = ByteTracker::from_config(&config);
        tracker.update(&[person(10.0)], &frame());
        assert!(tracker.current_tracks()[0].confirmed);

        tracker.update(&[], &frame());
        assert_eq!(tracker.current_tracks()[0].frames_since_update, 1);
        tracker.update(&[], &frame());
        assert_eq!(tracker.current_tracks()[0].frames_since_update, 2);
        tracker.update(&[], &frame());
        assert!(tracker.current_tracks().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut tracker = ByteTracker::new();
        tracker.update(&[person(10.0)], &frame());
        tracker.reset();
        assert!(tracker.current_tracks().is_empty());
        tracker.update(&[person(10.0)], &frame());
        assert_eq!(tracker.current_tracks()[0].id, 1);
    }
}
