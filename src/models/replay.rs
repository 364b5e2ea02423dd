// 检测结果回放: 离线处理时用预先跑好的检测结果代替在线模型
// 文件格式: JSON Lines, 每行一帧, 内容为该帧的检测列表
//   [{"box": [x1, y1, x2, y2], "confidence": 0.9, "keypoints": [[x, y, c], ...]}, ...]

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::PersonDetector;
use crate::detection::{BBox, Detection, PoseKeypoints};

/// 单个检测的序列化格式
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionEntry {
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub confidence: f32,
    #[serde(default)]
    pub keypoints: Vec<[f32; 3]>,
}

impl From<DetectionEntry> for Detection {
    fn from(entry: DetectionEntry) -> Self {
        let [x1, y1, x2, y2] = entry.bbox;
        Detection {
            bbox: BBox::new(x1, y1, x2, y2, entry.confidence),
            keypoints: PoseKeypoints::new(
                entry.keypoints.iter().map(|k| (k[0], k[1], k[2])).collect(),
            ),
        }
    }
}

/// 按帧顺序回放检测结果, 用完后返回空列表
pub struct ReplayDetector {
    frames: VecDeque<Vec<Detection>>,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read detections from {}", path.display()))?;
        Self::parse(&text)
    }

    /// 解析 JSON Lines, 空行视为无人帧
    pub fn parse(text: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                frames.push(Vec::new());
                continue;
            }
            let entries: Vec<DetectionEntry> = serde_json::from_str(line)
                .with_context(|| format!("invalid detections on line {}", line_no + 1))?;
            frames.push(entries.into_iter().map(Detection::from).collect());
        }
        Ok(Self::new(frames))
    }

    /// 剩余帧数
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl PersonDetector for ReplayDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}
