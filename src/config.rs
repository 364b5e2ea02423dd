// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 流水线配置 - 通过JSON文件调整参数

use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// 流水线参数配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 检测参数 ===
    pub min_detection_confidence: f32, // 低于此置信度的人体框直接丢弃

    // === 人脸可见性判定 ===
    pub face_keypoint_count: usize,    // 取前N个关键点作为面部关键点
    pub face_keypoint_confidence: f32, // 关键点可见阈值 (严格大于)
    pub face_min_visible: usize,       // 至少多少个面部关键点可见

    // === 身份核验共识 ===
    pub verification_votes: usize, // 票数达到该值后定案 (必须为奇数)

    // === 暴力检测 ===
    pub proximity_iou_threshold: f32,      // 两人框IOU超过该值视为近距离接触
    pub clip_size: u32,                    // 片段帧预处理后的正方形边长
    pub frame_window: usize,               // 帧窗口容量
    pub score_window: usize,               // 概率向量窗口容量
    pub cooldown_budget: u32,              // 告警冷却帧数预算
    pub cooldown_min_active_duration: u32, // 持续时长达到该值才走冷却, 否则立即解除
    pub inactivity_reset_frames: u32,      // 连续无人帧数达到该值时清空窗口
    pub violence_class_index: usize,       // "Violence" 类别在概率向量中的下标
    pub class_labels: Vec<String>,         // 类别名称 (下标与概率向量对齐)

    // === 输出 ===
    pub jpeg_quality: u8,          // 标注帧JPEG编码质量
    pub font_path: Option<String>, // ID标签字体 (未配置则只画框)

    // === 跟踪器参数 ===
    pub tracker_max_age: u32,            // 最大丢失帧数
    pub tracker_n_init: u32,             // 连续命中多少帧后确认轨迹
    pub tracker_high_score_threshold: f32, // 高分阈值
    pub tracker_low_score_threshold: f32,  // 低分阈值
    pub tracker_high_iou_threshold: f32,   // 高分IOU阈值
    pub tracker_low_iou_threshold: f32,    // 低分IOU阈值
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.6,

            face_keypoint_count: 5,
            face_keypoint_confidence: 0.8,
            face_min_visible: 3,

            verification_votes: 5,

            proximity_iou_threshold: 0.01,
            clip_size: 64,
            frame_window: 13,
            score_window: 128,
            cooldown_budget: 5,
            cooldown_min_active_duration: 1,
            inactivity_reset_frames: 300,
            violence_class_index: 1,
            class_labels: vec!["No Violence".to_string(), "Violence".to_string()],

            jpeg_quality: 90,
            font_path: None,

            // DeepSort 原始设置: max_age=35, n_init=4
            tracker_max_age: 35,
            tracker_n_init: 4,
            tracker_high_score_threshold: 0.4,
            tracker_low_score_threshold: 0.1,
            tracker_high_iou_threshold: 0.4,
            tracker_low_iou_threshold: 0.3,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写出一份默认配置; 解析失败时回退到默认值。
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {:#}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path);
        Ok(())
    }

    /// 检查参数组合是否合法
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.verification_votes % 2 == 1,
            "verification_votes must be odd to rule out ties, got {}",
            self.verification_votes
        );
        ensure!(self.frame_window > 0, "frame_window must be positive");
        ensure!(self.score_window > 0, "score_window must be positive");
        ensure!(self.clip_size > 0, "clip_size must be positive");
        ensure!(
            self.violence_class_index < self.class_labels.len(),
            "violence_class_index {} out of range for {} class labels",
            self.violence_class_index,
            self.class_labels.len()
        );
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前流水线配置:");
        info!("  检测置信度: {:.2}", self.min_detection_confidence);
        info!("  核验票数: {}", self.verification_votes);
        info!(
            "  暴力窗口: {}帧 / {}分数 | 冷却: {}帧",
            self.frame_window, self.score_window, self.cooldown_budget
        );
        info!("  无人重置: {}帧", self.inactivity_reset_frames);
        info!(
            "  跟踪器: max_age={} n_init={}",
            self.tracker_max_age, self.tracker_n_init
        );
    }
}

/// 离线处理程序参数
#[derive(Parser, Debug)]
#[command(author, version, about = "数字卫兵: 逐帧身份核验与暴力告警", long_about = None)]
pub struct Args {
    /// 输入帧目录 (按文件名排序, 每个文件一帧编码图像)
    #[arg(short, long)]
    pub frames: PathBuf,

    /// 每帧检测结果 (JSON Lines, 每行一帧)
    #[arg(short, long)]
    pub detections: PathBuf,

    /// 已登记人脸图片目录
    #[arg(short, long)]
    pub gallery: Option<PathBuf>,

    /// 标注帧输出目录
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// 配置文件
    #[arg(short, long, default_value = "sentinel.json")]
    pub config: String,

    /// ID标签字体 (覆盖配置文件)
    #[arg(long)]
    pub font: Option<String>,

    /// 暴力信号输出 (JSON Lines)
    #[arg(long)]
    pub signals: Option<PathBuf>,

    /// 人脸指纹最大汉明距离
    #[arg(long, default_value_t = 10)]
    pub face_distance: u32,
}
