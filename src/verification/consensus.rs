//! 身份核验共识 (Identity Verification Consensus Engine)
//!
//! 单帧人脸比对结果噪声很大, 这里按身份累计投票, 票数达到上限后
//! 以多数票写入最终结论, 之后不再查询模型。

use image::{imageops, Rgb, RgbImage};
use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::detection::{BBox, IdentityRecord};
use crate::models::FaceVerifier;

/// 未定案且本帧看不到人脸
pub const NEUTRAL_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// (暂时或最终) 核验通过
pub const VERIFIED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// (暂时或最终) 核验未通过
pub const UNVERIFIED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// 单个身份在本帧的核验结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameVote {
    /// 已有最终结论, 本帧未查询
    Decided(bool),
    /// 人脸不可见, 不计票
    NoFace,
    /// 计入一票
    Vote(bool),
}

impl FrameVote {
    /// 标注框颜色
    pub fn color(&self) -> Rgb<u8> {
        match self {
            FrameVote::NoFace => NEUTRAL_COLOR,
            FrameVote::Decided(true) | FrameVote::Vote(true) => VERIFIED_COLOR,
            FrameVote::Decided(false) | FrameVote::Vote(false) => UNVERIFIED_COLOR,
        }
    }
}

/// 投票共识引擎
#[derive(Clone, Debug)]
pub struct ConsensusEngine {
    /// 定案所需票数 (奇数, 不会平票)
    votes_required: usize,
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl ConsensusEngine {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            votes_required: config.verification_votes.max(1),
        }
    }

    /// 处理一个身份的本帧核验
    ///
    /// 人脸模型的任何失败都按"未匹配"计票, 不向外传播。
    pub fn evaluate(
        &self,
        record: &mut IdentityRecord,
        face_visible: bool,
        frame: &RgbImage,
        verifier: &mut dyn FaceVerifier,
    ) -> FrameVote {
        if let Some(verified) = record.verified {
            return FrameVote::Decided(verified);
        }
        if !face_visible {
            return FrameVote::NoFace;
        }

        let vote = match crop_region(frame, &record.bbox) {
            None => {
                warn!("⚠️ 身份 #{} 裁剪区域为空, 记为未匹配", record.track_id);
                false
            }
            Some(face) => match verifier.verify(&face) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!("❌ 身份 #{} 人脸核验失败: {:#}", record.track_id, e);
                    false
                }
            },
        };

        self.record_vote(record, vote);
        FrameVote::Vote(vote)
    }

    /// 追加一票, 票数足够时写入最终结论
    pub fn record_vote(&self, record: &mut IdentityRecord, vote: bool) {
        if record.verified.is_some() {
            return;
        }

        let votes = record.votes.get_or_insert_with(Vec::new);
        votes.push(vote);

        if votes.len() >= self.votes_required {
            let true_count = votes.iter().filter(|v| **v).count();
            let false_count = votes.len() - true_count;
            let verified = true_count > false_count;
            info!(
                "🪪 身份 #{} 核验定案: {} ({}通过/{}未通过)",
                record.track_id,
                if verified { "通过" } else { "未通过" },
                true_count,
                false_count
            );
            record.verified = Some(verified);
        }
    }
}

/// 按帧边界裁剪框内区域; 裁剪后为空返回 None
pub fn crop_region(frame: &RgbImage, bbox: &BBox) -> Option<RgbImage> {
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let x1 = (bbox.x1 as i64).max(0);
    let y1 = (bbox.y1 as i64).max(0);
    let x2 = (bbox.x2 as i64).min(w);
    let y2 = (bbox.y2 as i64).min(h);
    debug!("裁剪区域: ({}, {}) - ({}, {})", x1, y1, x2, y2);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(
        imageops::crop_imm(
            frame,
            x1 as u32,
            y1 as u32,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
        )
        .to_image(),
    )
}
