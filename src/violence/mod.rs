//! 暴力事件状态机 (Violence Event State Machine)
//!
//! 状态: Idle ⇄ Armed (Armed 内含冷却阶段)
//! - Idle:  有两人距离足够近(框IOU超过阈值)时才把当前帧推入窗口
//! - Armed: 每帧无条件推入窗口, 连续 `cooldown_budget` 次判为 "No Violence" 后回到 Idle
//!
//! 窗口满后每推入一帧就分类一次, 概率向量进入分数窗口, 对分数窗口求均值后取最大类别。
//! 每帧的状态转移是原子的: 分类成功才提交帧、分数和状态变化, 分类失败则全部保持不变。

pub mod window;

use std::collections::BTreeMap;

use image::RgbImage;
use log::{debug, info, warn};
use ndarray::Array1;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::detection::{iou, IdentityRecord, TrackId};
use crate::models::ViolenceClassifier;

pub use window::{preprocess_clip, BoundedWindow, ClipFrame};

/// 告警状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertPhase {
    Idle,
    Armed,
}

/// 单次分类的结论
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolenceLabel {
    Violence,
    NoViolence,
}

/// 每帧对外输出的暴力检测信号
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViolenceSignal {
    pub violence_detected: bool,
    /// 最近一次分类中最大类别的平均概率 (百分比)
    pub confidence: f32,
    /// 告警持续帧数, 未告警时为0
    pub active_duration: u32,
}

/// 会话级暴力检测状态
pub struct ViolenceState {
    frames: BoundedWindow<ClipFrame>,
    scores: BoundedWindow<Array1<f32>>,
    phase: AlertPhase,
    active_duration: u32,
    cooldown_count: u32,
    /// 最近一次分类的置信度 (百分比)
    confidence: f32,

    proximity_iou_threshold: f32,
    clip_size: u32,
    cooldown_budget: u32,
    /// 持续时长低于该值时不走冷却, 直接解除告警
    cooldown_min_active_duration: u32,
    violence_class_index: usize,
    class_labels: Vec<String>,
}

impl ViolenceState {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            frames: BoundedWindow::new(config.frame_window),
            scores: BoundedWindow::new(config.score_window),
            phase: AlertPhase::Idle,
            active_duration: 0,
            cooldown_count: 0,
            confidence: 0.0,
            proximity_iou_threshold: config.proximity_iou_threshold,
            clip_size: config.clip_size,
            cooldown_budget: config.cooldown_budget,
            cooldown_min_active_duration: config.cooldown_min_active_duration,
            violence_class_index: config.violence_class_index,
            class_labels: config.class_labels.clone(),
        }
    }

    /// 处理一帧; 少于两人时状态不变
    pub fn step(
        &mut self,
        frame: &RgbImage,
        records: &BTreeMap<TrackId, IdentityRecord>,
        classifier: &mut dyn ViolenceClassifier,
    ) -> ViolenceSignal {
        if records.len() < 2 {
            return self.signal();
        }

        match self.phase {
            AlertPhase::Idle => {
                let Some((a, b)) = self.find_close_pair(records) else {
                    return self.signal();
                };
                debug!("👥 #{} 与 #{} 距离过近", a, b);
                if let Some(ViolenceLabel::Violence) = self.observe(frame, classifier) {
                    self.phase = AlertPhase::Armed;
                    self.active_duration = 1;
                    self.cooldown_count = 0;
                    info!(
                        "🚨 检测到暴力行为 (#{} / #{}), 置信度 {:.1}%",
                        a, b, self.confidence
                    );
                }
            }
            AlertPhase::Armed => match self.observe(frame, classifier) {
                Some(ViolenceLabel::Violence) => {
                    self.active_duration += 1;
                    self.cooldown_count = 0;
                }
                Some(ViolenceLabel::NoViolence) => self.cool_down(),
                None => {}
            },
        }

        self.signal()
    }

    /// 第一对框IOU超过阈值的身份 (按ID升序枚举)
    fn find_close_pair(
        &self,
        records: &BTreeMap<TrackId, IdentityRecord>,
    ) -> Option<(TrackId, TrackId)> {
        let people: Vec<&IdentityRecord> = records.values().collect();
        for (i, a) in people.iter().enumerate() {
            for b in &people[i + 1..] {
                if iou(&a.bbox, &b.bbox) > self.proximity_iou_threshold {
                    return Some((a.track_id, b.track_id));
                }
            }
        }
        None
    }

    /// 推入一帧, 窗口满时分类
    ///
    /// 返回 None 表示窗口未满或本帧分类失败; 失败时窗口与状态都不变。
    fn observe(
        &mut self,
        frame: &RgbImage,
        classifier: &mut dyn ViolenceClassifier,
    ) -> Option<ViolenceLabel> {
        let clip = match preprocess_clip(frame, self.clip_size) {
            Ok(clip) => clip,
            Err(e) => {
                warn!("❌ 片段帧预处理失败: {:#}", e);
                return None;
            }
        };

        if self.frames.len() + 1 < self.frames.capacity() {
            self.frames.push(clip);
            return None;
        }

        // 以"推入后"的窗口分类, 成功后再提交
        let skip = usize::from(self.frames.is_full());
        let window: Vec<&ClipFrame> = self
            .frames
            .iter()
            .skip(skip)
            .chain(std::iter::once(&clip))
            .collect();
        let probs = match classifier.classify(&window) {
            Ok(probs) if probs.iter().any(|p| !p.is_finite()) => {
                warn!("❌ 暴力分类输出包含非有限值: {}", probs);
                return None;
            }
            Ok(probs) if probs.len() == self.class_labels.len() => probs,
            Ok(probs) => {
                warn!(
                    "❌ 暴力分类输出长度 {} 与类别数 {} 不符",
                    probs.len(),
                    self.class_labels.len()
                );
                return None;
            }
            Err(e) => {
                warn!("❌ 暴力分类失败, 保持当前状态: {:#}", e);
                return None;
            }
        };

        self.frames.push(clip);
        self.scores.push(probs);

        let mean = self.mean_scores();
        let (best, best_prob) = argmax(&mean);
        self.confidence = best_prob * 100.0;
        debug!(
            "暴力分类: {} ({:.1}%)",
            self.class_labels.get(best).map_or("?", String::as_str),
            self.confidence
        );

        Some(if best == self.violence_class_index {
            ViolenceLabel::Violence
        } else {
            ViolenceLabel::NoViolence
        })
    }

    /// 告警期间判为无暴力
    fn cool_down(&mut self) {
        if self.active_duration < self.cooldown_min_active_duration {
            info!("✅ 告警解除 (持续 {} 帧)", self.active_duration);
            self.disarm();
            return;
        }

        self.cooldown_count += 1;
        if self.cooldown_count >= self.cooldown_budget {
            info!(
                "✅ 冷却结束, 告警解除 (持续 {} 帧)",
                self.active_duration
            );
            self.disarm();
        }
    }

    fn disarm(&mut self) {
        self.phase = AlertPhase::Idle;
        self.active_duration = 0;
        self.cooldown_count = 0;
    }

    fn mean_scores(&self) -> Array1<f32> {
        let mut acc = Array1::<f32>::zeros(self.class_labels.len());
        for s in self.scores.iter() {
            acc += s;
        }
        acc / self.scores.len().max(1) as f32
    }

    /// 清空帧窗口与分数窗口 (长时间无人时调用), 告警状态不变
    pub fn clear_windows(&mut self) {
        self.frames.clear();
        self.scores.clear();
        info!("🧹 长时间无人, 暴力检测窗口已清空");
    }

    pub fn signal(&self) -> ViolenceSignal {
        let armed = self.is_armed();
        ViolenceSignal {
            violence_detected: armed,
            confidence: self.confidence,
            active_duration: if armed { self.active_duration } else { 0 },
        }
    }

    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        self.phase == AlertPhase::Armed
    }

    pub fn active_duration(&self) -> u32 {
        self.active_duration
    }

    pub fn cooldown_count(&self) -> u32 {
        self.cooldown_count
    }

    pub fn frame_window_len(&self) -> usize {
        self.frames.len()
    }

    pub fn score_window_len(&self) -> usize {
        self.scores.len()
    }

    /// 告警标签文字
    pub fn alert_label(&self) -> &str {
        self.class_labels
            .get(self.violence_class_index)
            .map_or("Violence", String::as_str)
    }
}

/// 最大类别下标及其概率 (同分取第一个)
fn argmax(probs: &Array1<f32>) -> (usize, f32) {
    let mut best = (0, f32::MIN);
    for (idx, &p) in probs.iter().enumerate() {
        if p > best.1 {
            best = (idx, p);
        }
    }
    best
}
