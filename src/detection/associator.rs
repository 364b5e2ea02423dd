//! 轨迹-检测关联 (Track-Detection Associator)
//!
//! 跟踪器只给出ID和平滑后的框, 关键点来自检测器; 这里按IOU把两者绑定,
//! 生成每个身份本帧的 `IdentityRecord`。

use std::collections::BTreeMap;

use image::RgbImage;
use log::debug;

use super::tracker::{iou, Tracker};
use super::types::{BBox, Detection, IdentityRecord, TrackId};

/// 轨迹最多允许多少帧未更新仍参与关联
pub const MAX_FRAMES_SINCE_UPDATE: u32 = 1;

/// 关联当前帧的跟踪结果与检测结果
///
/// - 检测为空时直接返回空表, 不调用跟踪器
/// - 只保留已确认且最近1帧内更新过的轨迹
/// - 每条轨迹取IOU最大的检测框 (同分取检测顺序中第一个); IOU全为0则本帧不出记录
/// - 从 `previous` 继承同ID的投票历史与核验结论
pub fn associate(
    tracker: &mut dyn Tracker,
    detections: &[Detection],
    frame: &RgbImage,
    previous: &BTreeMap<TrackId, IdentityRecord>,
) -> BTreeMap<TrackId, IdentityRecord> {
    let mut records = BTreeMap::new();
    if detections.is_empty() {
        return records;
    }

    let boxes: Vec<BBox> = detections.iter().map(|d| d.bbox.clone()).collect();
    tracker.update(&boxes, frame);

    for track in tracker.current_tracks() {
        if !track.confirmed || track.frames_since_update > MAX_FRAMES_SINCE_UPDATE {
            continue;
        }

        let Some(best) = best_match(&track.bbox, &boxes) else {
            debug!("轨迹 #{} 本帧无匹配检测框", track.id);
            continue;
        };

        let mut record =
            IdentityRecord::new(track.id, track.bbox, detections[best].keypoints.clone());
        if let Some(prev) = previous.get(&track.id) {
            record.votes = prev.votes.clone();
            record.verified = prev.verified;
        }
        records.insert(track.id, record);
    }

    records
}

/// IOU最大的检测框下标; 严格大于才替换, 因此同分保留第一个
fn best_match(track_box: &BBox, boxes: &[BBox]) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut best_iou = 0.0;
    for (idx, candidate) in boxes.iter().enumerate() {
        let overlap = iou(track_box, candidate);
        if overlap > best_iou {
            best_iou = overlap;
            best = Some(idx);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::PoseKeypoints;
    use crate::testing::{detection, ScriptedTracker};

    #[test]
    fn test_empty_detections_skip_tracker() {
        let mut tracker = ScriptedTracker::confirmed(vec![(1, BBox::new(0.0, 0.0, 10.0, 10.0, 1.0))]);
        let records = associate(&mut tracker, &[], &RgbImage::new(4, 4), &BTreeMap::new());
        assert!(records.is_empty());
        assert_eq!(tracker.update_calls, 0);
    }

    #[test]
    fn test_keypoints_from_detection_box_from_tracker() {
        let track_box = BBox::new(12.0, 12.0, 52.0, 112.0, 1.0);
        let mut tracker = ScriptedTracker::confirmed(vec![(7, track_box.clone())]);
        let dets = vec![
            detection(200.0, 10.0, 0.9),
            detection(10.0, 10.0, 0.9), // 与轨迹重合
        ];
        let records = associate(&mut tracker, &dets, &RgbImage::new(4, 4), &BTreeMap::new());

        assert_eq!(tracker.update_calls, 1);
        let record = &records[&7];
        assert_eq!(record.bbox, track_box);
        assert_eq!(record.keypoints, dets[1].keypoints);
        assert_eq!(record.votes, None);
        assert_eq!(record.verified, None);
    }

    #[test]
    fn test_unconfirmed_and_stale_tracks_skipped() {
        let b = BBox::new(10.0, 10.0, 50.0, 110.0, 1.0);
        let mut tracker = ScriptedTracker::confirmed(vec![(1, b.clone()), (2, b.clone()), (3, b)]);
        tracker.tracks[1].confirmed = false;
        tracker.tracks[2].frames_since_update = 2;

        let dets = vec![detection(10.0, 10.0, 0.9)];
        let records = associate(&mut tracker, &dets, &RgbImage::new(4, 4), &BTreeMap::new());
        assert_eq!(records.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_one_frame_old_track_kept() {
        let b = BBox::new(10.0, 10.0, 50.0, 110.0, 1.0);
        let mut tracker = ScriptedTracker::confirmed(vec![(4, b)]);
        tracker.tracks[0].frames_since_update = 1;
        let dets = vec![detection(10.0, 10.0, 0.9)];
        let records = associate(&mut tracker, &dets, &RgbImage::new(4, 4), &BTreeMap::new());
        assert!(records.contains_key(&4));
    }

    #[test]
    fn test_no_overlap_no_record() {
        let mut tracker =
            ScriptedTracker::confirmed(vec![(1, BBox::new(500.0, 500.0, 540.0, 600.0, 1.0))]);
        let dets = vec![detection(10.0, 10.0, 0.9)];
        let records = associate(&mut tracker, &dets, &RgbImage::new(4, 4), &BTreeMap::new());
        assert!(records.is_empty());
    }

    #[test]
    fn test_tie_break_first_detection() {
        let mut tracker = ScriptedTracker::confirmed(vec![(1, BBox::new(10.0, 10.0, 50.0, 110.0, 1.0))]);
        let mut first = detection(10.0, 10.0, 0.9);
        first.keypoints = PoseKeypoints::new(vec![(1.0, 1.0, 0.5)]);
        let mut second = detection(10.0, 10.0, 0.9);
        second.keypoints = PoseKeypoints::new(vec![(2.0, 2.0, 0.5)]);
        let records = associate(
            &mut tracker,
            &[first.clone(), second],
            &RgbImage::new(4, 4),
            &BTreeMap::new(),
        );
        assert_eq!(records[&1].keypoints, first.keypoints);
    }

    #[test]
    fn test_carry_forward_votes_and_verdict() {
        let b = BBox::new(10.0, 10.0, 50.0, 110.0, 1.0);
        let mut tracker = ScriptedTracker::confirmed(vec![(1, b.clone()), (2, b.clone())]);

        let mut previous = BTreeMap::new();
        let mut prev1 = IdentityRecord::new(1, b.clone(), PoseKeypoints::default());
        prev1.votes = Some(vec![true, false]);
        previous.insert(1, prev1);
        let mut prev9 = IdentityRecord::new(9, b, PoseKeypoints::default());
        prev9.verified = Some(true);
        previous.insert(9, prev9);

        let dets = vec![detection(10.0, 10.0, 0.9)];
        let records = associate(&mut tracker, &dets, &RgbImage::new(4, 4), &previous);
        assert_eq!(records[&1].votes, Some(vec![true, false]));
        assert_eq!(records[&1].verified, None);
        assert_eq!(records[&2].votes, None);
        assert!(!records.contains_key(&9));
    }
}
