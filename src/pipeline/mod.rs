/// 逐帧编排器 (Frame Orchestrator)
///
/// 单个会话内严格逐帧处理:
/// 解码 → 人体检测 → 轨迹关联 → 暴力状态机 → 人脸核验共识 → 标注 → JPEG编码
///
/// 会话状态(上一帧身份表、暴力状态、无人帧计数、跟踪器)都由 `FrameProcessor` 独占;
/// 模型通过 `SharedModels` 在多个会话之间共享。
pub mod render;

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use log::{debug, info};

use crate::config::PipelineConfig;
use crate::detection::{associate, Detection, IdentityRecord, TrackId, Tracker};
use crate::models::{FaceVerifier, PersonDetector, Shared, ViolenceClassifier};
use crate::verification::{ConsensusEngine, FaceGate};
use crate::violence::{ViolenceSignal, ViolenceState};
use crate::PipelineError;

pub use render::Overlay;

/// 可跨会话共享的三个模型
#[derive(Clone)]
pub struct SharedModels {
    pub detector: Shared<dyn PersonDetector + Send>,
    pub face: Shared<dyn FaceVerifier + Send>,
    pub violence: Shared<dyn ViolenceClassifier + Send>,
}

/// 单帧处理结果
#[derive(Clone, Debug)]
pub struct FrameOutput {
    /// 标注后的JPEG
    pub encoded: Vec<u8>,
    pub signal: ViolenceSignal,
    /// 本帧身份数
    pub identities: usize,
}

/// 会话级逐帧处理器
pub struct FrameProcessor {
    models: SharedModels,
    tracker: Box<dyn Tracker + Send>,
    gate: FaceGate,
    consensus: ConsensusEngine,
    violence: ViolenceState,
    overlay: Overlay,

    /// 上一帧的身份表 (无人帧不覆盖)
    previous: BTreeMap<TrackId, IdentityRecord>,
    /// 连续无人帧数
    idle_frames: u32,
    frame_count: u64,

    min_detection_confidence: f32,
    inactivity_reset_frames: u32,
    jpeg_quality: u8,
}

impl FrameProcessor {
    pub fn new(
        config: &PipelineConfig,
        models: SharedModels,
        tracker: Box<dyn Tracker + Send>,
    ) -> Self {
        Self {
            models,
            tracker,
            gate: FaceGate::from_config(config),
            consensus: ConsensusEngine::from_config(config),
            violence: ViolenceState::new(config),
            overlay: Overlay::new(config.font_path.as_deref()),
            previous: BTreeMap::new(),
            idle_frames: 0,
            frame_count: 0,
            min_detection_confidence: config.min_detection_confidence,
            inactivity_reset_frames: config.inactivity_reset_frames,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// 处理一帧编码图像, 返回标注后的JPEG
    pub fn process_frame(&mut self, encoded: &[u8]) -> Result<Vec<u8>, PipelineError> {
        self.process_frame_with_signal(encoded).map(|out| out.encoded)
    }

    /// 处理一帧编码图像, 同时返回暴力检测信号
    pub fn process_frame_with_signal(
        &mut self,
        encoded: &[u8],
    ) -> Result<FrameOutput, PipelineError> {
        let mut frame = image::load_from_memory(encoded)
            .map_err(PipelineError::Decode)?
            .to_rgb8();
        self.frame_count += 1;

        let detections: Vec<Detection> = lock(&self.models.detector)
            .detect(&frame)
            .map_err(PipelineError::Detector)?
            .into_iter()
            .filter(|d| d.bbox.confidence >= self.min_detection_confidence)
            .collect();

        if detections.is_empty() {
            self.on_idle_frame();
            return Ok(FrameOutput {
                encoded: self.encode(&frame)?,
                signal: self.violence.signal(),
                identities: 0,
            });
        }
        self.idle_frames = 0;

        let mut records = associate(self.tracker.as_mut(), &detections, &frame, &self.previous);
        debug!(
            "第 {} 帧: {} 个检测, {} 个身份",
            self.frame_count,
            detections.len(),
            records.len()
        );

        let signal = if records.len() >= 2 {
            let mut classifier = lock(&self.models.violence);
            self.violence.step(&frame, &records, &mut *classifier)
        } else {
            self.violence.signal()
        };

        // 先算完所有颜色再画, 避免标注影响后续裁剪
        let mut colors = Vec::with_capacity(records.len());
        {
            let mut verifier = lock(&self.models.face);
            for record in records.values_mut() {
                let visible = self.gate.is_visible(&record.keypoints);
                let vote = self
                    .consensus
                    .evaluate(record, visible, &frame, &mut *verifier);
                colors.push((record.track_id, vote.color()));
            }
        }

        for (id, color) in colors {
            if let Some(record) = records.get(&id) {
                self.overlay
                    .draw_identity(&mut frame, &record.bbox, &id.to_string(), color);
            }
        }
        self.overlay
            .draw_alert(&mut frame, self.violence.alert_label(), &signal);

        let identities = records.len();
        self.previous = records;

        Ok(FrameOutput {
            encoded: self.encode(&frame)?,
            signal,
            identities,
        })
    }

    /// 无人帧: 累计计数, 到达上限后清空暴力检测窗口
    fn on_idle_frame(&mut self) {
        self.idle_frames += 1;
        if self.idle_frames >= self.inactivity_reset_frames {
            info!("💤 连续 {} 帧无人", self.idle_frames);
            self.violence.clear_windows();
            self.idle_frames = 0;
        }
    }

    fn encode(&self, frame: &RgbImage) -> Result<Vec<u8>, PipelineError> {
        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
        frame
            .write_with_encoder(encoder)
            .map_err(PipelineError::Encode)?;
        Ok(buf.into_inner())
    }

    /// 上一帧的身份表
    pub fn records(&self) -> &BTreeMap<TrackId, IdentityRecord> {
        &self.previous
    }

    pub fn violence(&self) -> &ViolenceState {
        &self.violence
    }

    pub fn idle_frames(&self) -> u32 {
        self.idle_frames
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// 模型锁中毒时继续使用内部数据 (模型调用失败已在各阶段降级处理)
fn lock<T: ?Sized>(model: &Mutex<T>) -> MutexGuard<'_, T> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}
