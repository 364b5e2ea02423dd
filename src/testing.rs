//! 单元测试用替身: 脚本化的跟踪器/分类器/核验器

use std::io::Cursor;

use anyhow::{bail, Result};
use image::{ImageFormat, RgbImage};
use ndarray::{array, Array1};

use crate::detection::{BBox, Detection, PoseKeypoints, TrackId, TrackSnapshot, Tracker};
use crate::models::{FaceVerifier, ViolenceClassifier};
use crate::violence::ClipFrame;

/// 17个关键点, 面部5点置信度0.9, 其余0.5
pub fn detection(x: f32, y: f32, confidence: f32) -> Detection {
    let mut points = vec![(x + 20.0, y + 10.0, 0.9); 5];
    points.extend(std::iter::repeat((x + 20.0, y + 50.0, 0.5)).take(12));
    Detection {
        bbox: BBox::new(x, y, x + 40.0, y + 100.0, confidence),
        keypoints: PoseKeypoints::new(points),
    }
}

/// 仅指定置信度的关键点序列
pub fn keypoints_with(confidences: &[f32]) -> PoseKeypoints {
    PoseKeypoints::new(confidences.iter().map(|&c| (0.0, 0.0, c)).collect())
}

pub fn encode_png(frame: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    frame.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// 轨迹固定不变的跟踪器, 只统计 update 调用次数
pub struct ScriptedTracker {
    pub tracks: Vec<TrackSnapshot>,
    pub update_calls: usize,
}

impl ScriptedTracker {
    pub fn confirmed(tracks: Vec<(TrackId, BBox)>) -> Self {
        Self {
            tracks: tracks
                .into_iter()
                .map(|(id, bbox)| TrackSnapshot {
                    id,
                    confirmed: true,
                    frames_since_update: 0,
                    bbox,
                })
                .collect(),
            update_calls: 0,
        }
    }
}

impl Tracker for ScriptedTracker {
    fn update(&mut self, _detections: &[BBox], _frame: &RgbImage) {
        self.update_calls += 1;
    }

    fn current_tracks(&self) -> Vec<TrackSnapshot> {
        self.tracks.clone()
    }

    fn reset(&mut self) {
        self.tracks.clear();
    }
}

/// 按开关返回固定类别的分类器
#[derive(Default)]
pub struct ScriptedClassifier {
    pub violent: bool,
    pub fail: bool,
    pub calls: usize,
    pub last_window_len: usize,
}

impl ScriptedClassifier {
    pub fn violent() -> Self {
        Self {
            violent: true,
            ..Default::default()
        }
    }

    pub fn calm() -> Self {
        Self::default()
    }
}

impl ViolenceClassifier for ScriptedClassifier {
    fn classify(&mut self, window: &[&ClipFrame]) -> Result<Array1<f32>> {
        self.calls += 1;
        self.last_window_len = window.len();
        if self.fail {
            bail!("scripted classifier failure");
        }
        Ok(if self.violent {
            array![0.1, 0.9]
        } else {
            array![0.9, 0.1]
        })
    }
}

/// 固定结果的人脸核验器
#[derive(Default)]
pub struct FixedVerifier {
    pub matches: bool,
    pub fail: bool,
    pub calls: usize,
}

impl FixedVerifier {
    pub fn matching(matches: bool) -> Self {
        Self {
            matches,
            ..Default::default()
        }
    }
}

impl FaceVerifier for FixedVerifier {
    fn verify(&mut self, _face: &RgbImage) -> Result<bool> {
        self.calls += 1;
        if self.fail {
            bail!("scripted verifier failure");
        }
        Ok(self.matches)
    }
}
